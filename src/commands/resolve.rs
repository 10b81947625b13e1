use didplc::client::Client;

use crate::cli::Resolve;

impl Resolve {
    pub(crate) async fn run(&self, client: &Client) -> anyhow::Result<()> {
        let doc = client.resolve(&self.did).await?;
        println!("{}", serde_json::to_string(&doc)?);
        Ok(())
    }
}
