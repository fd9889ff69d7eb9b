//! Boxed wrapper: copy-by-value structures behind pluggable strategies.

use std::sync::Arc;

use objbridge_core::{
    Block, BoxedWrapper, BridgeResult, ConversionError, Handle, NativeTypeId, Ownership,
};
use objbridge_registry::{BoxedStrategy, TypeInfo, WrapperStrategy};

use crate::Bridge;

impl Bridge {
    /// Wrap a boxed block through its type's strategy.
    ///
    /// When `owned`, dropping the last handle runs the strategy's `destroy`;
    /// otherwise the block's lifetime is managed elsewhere.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn wrap_boxed(&self, block: Block, ty: NativeTypeId, owned: bool) -> BridgeResult<Handle> {
        let (info, strategy) = self.boxed_strategy(ty)?;
        let wrapper = strategy.wrap(
            info.type_id,
            Arc::clone(&info.package),
            block,
            Ownership::from_owned(owned),
        )?;
        if owned {
            wrapper.set_destroy(Arc::new(move |wrapper: &BoxedWrapper| {
                strategy.destroy(wrapper)
            }));
        }
        Ok(Handle::Boxed(Arc::new(wrapper)))
    }

    /// Wrap a private copy of `block`, made by the strategy. The handle owns
    /// the copy.
    pub fn wrap_boxed_copy(&self, block: &Block, ty: NativeTypeId) -> BridgeResult<Handle> {
        let (_, strategy) = self.boxed_strategy(ty)?;
        self.wrap_boxed(strategy.copy(block), ty, true)
    }

    /// Extract the block behind a handle of `ty` or one of its synonyms.
    pub fn unwrap_boxed(&self, handle: &Handle, ty: NativeTypeId) -> BridgeResult<Block> {
        let (info, strategy) = self.boxed_strategy(ty)?;
        let wrapper = match handle.as_boxed() {
            Some(wrapper) if self.inner.registry.same_type(wrapper.type_id(), ty) => wrapper,
            _ => {
                return Err(ConversionError::mismatch(&*info.package, handle.type_name()).into());
            }
        };
        Ok(strategy.unwrap(wrapper)?)
    }

    fn boxed_strategy(&self, ty: NativeTypeId) -> BridgeResult<(TypeInfo, Arc<dyn BoxedStrategy>)> {
        let info = self
            .inner
            .registry
            .resolve(ty)
            .ok_or_else(|| ConversionError::UnconvertibleType {
                type_name: self.describe_type(ty),
            })?;
        let strategy = match &info.strategy {
            Some(WrapperStrategy::Boxed(strategy)) => Arc::clone(strategy),
            _ => {
                return Err(
                    ConversionError::mismatch("boxed", info.classification.as_str()).into(),
                );
            }
        };
        Ok((info, strategy))
    }
}
