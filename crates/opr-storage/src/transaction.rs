//! Scoped transactions. Every transaction reaches `commit()`
//! or `fail()` on every exit path; callers that forget to close one leak
//! the serializable lock a READWRITE transaction holds.

use async_trait::async_trait;

use opr_core::OprResult;

use crate::types::Isolation;

#[async_trait]
pub trait Transaction: Send + Sync {
    fn isolation(&self) -> Isolation;

    /// Commit the transaction's writes, releasing any held lock.
    async fn commit(self: Box<Self>) -> OprResult<()>;

    /// Abort the transaction, discarding its writes and releasing any
    /// held lock.
    async fn fail(self: Box<Self>) -> OprResult<()>;
}
