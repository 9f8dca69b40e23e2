//! BEVY ECS INTEGRATION MODULE
//!
//! Lets a Bevy app keep one `InteractionManager` per entity as a component.
//! Only depends on `bevy_ecs`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tandem_shared::bevy_integration::*;
//! use bevy_ecs::prelude::*;
//!
//! let owner = EntityRef::from(entity);
//! commands.entity(entity).insert(Interactions::new(InteractionManager::new(
//!     owner,
//!     HostType::Server,
//!     resolver.clone(),
//!     ManagerConfig::default(),
//! )));
//! ```

#[cfg(feature = "bevy_ecs")]
mod bevy_integration_impl {
    use std::ops::{Deref, DerefMut};

    use bevy_ecs::{component::Component, entity::Entity as BevyEntity};

    use crate::{EntityRef, InteractionManager};

    impl From<BevyEntity> for EntityRef {
        fn from(entity: BevyEntity) -> Self {
            EntityRef::from_u64(entity.to_bits())
        }
    }

    /// Component holding the interaction manager of its entity
    #[derive(Component)]
    pub struct Interactions(pub InteractionManager);

    impl Interactions {
        pub fn new(manager: InteractionManager) -> Self {
            Self(manager)
        }
    }

    impl Deref for Interactions {
        type Target = InteractionManager;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl DerefMut for Interactions {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }
}

#[cfg(feature = "bevy_ecs")]
pub use bevy_integration_impl::Interactions;
