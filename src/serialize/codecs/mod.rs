//! The concrete codec set, one per data category.
//!
//! [`default_codecs`] fixes the registration order. Two rules in it are
//! load-bearing: the reference codec precedes the bean codec so reference
//! classes marshal as opaque handles, and the container/map codecs precede
//! the bean codec so hinted wrappers never reach bean resolution.

mod bean;
mod containers;
mod date;
mod enums;
mod map;
mod raw;
mod reference;
mod scalar;

use std::sync::Arc;

use super::Codec;

/// The default codec set, in routing order.
pub fn default_codecs() -> Vec<Arc<dyn Codec>> {
    vec![
        Arc::new(reference::ReferenceCodec),
        Arc::new(date::DateCodec),
        Arc::new(enums::EnumCodec),
        Arc::new(containers::ContainerCodec),
        Arc::new(map::MapCodec),
        Arc::new(bean::BeanCodec),
        Arc::new(raw::RawCodec),
        Arc::new(scalar::NumberCodec),
        Arc::new(scalar::BooleanCodec),
        Arc::new(scalar::StringCodec),
    ]
}
