use didplc::client::Client;

use crate::cli::Oplog;

impl Oplog {
    pub(crate) async fn run(&self, client: &Client) -> anyhow::Result<()> {
        let entries = client.op_log(&self.did, self.audit).await?;
        println!("{}", serde_json::to_string(&entries)?);
        Ok(())
    }
}
