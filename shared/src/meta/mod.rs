mod meta_store;
mod meta_value;

pub use meta_store::{MetaDelta, MetaStore};
pub use meta_value::{
    MetaKey, MetaValue, CHARGE_VALUE, DAMAGE, HIT_LOCATION, TARGET_BLOCK, TARGET_ENTITY,
};
