use async_trait::async_trait;
use miette::Result;

pub mod check;
pub mod fmt;
pub mod list;

#[async_trait]
pub trait RqCommand {
    async fn execute(self) -> Result<()>;
}
