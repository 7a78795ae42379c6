use async_trait::async_trait;
use streamscope_core_types::PageId;
use streamscope_relay::InjectError;

/// Re-injects the content context and interceptor into a page on announce.
#[async_trait]
pub trait ScriptInjector: Send + Sync {
    async fn inject(&self, page: PageId) -> Result<(), InjectError>;
}

/// Injector for hosts that cannot inject scripts.
pub struct NoopInjector;

#[async_trait]
impl ScriptInjector for NoopInjector {
    async fn inject(&self, _page: PageId) -> Result<(), InjectError> {
        Ok(())
    }
}
