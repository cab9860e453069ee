use miette::Result;
use requisite::Requisite;

#[async_std::main]
async fn main() -> Result<()> {
    Requisite::load().await
}
