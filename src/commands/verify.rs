use didplc::client::Client;
use didplc::log::verify_op_log;

use crate::cli::Verify;

impl Verify {
    pub(crate) async fn run(&self, client: &Client) -> anyhow::Result<()> {
        let entries = client.op_log(&self.did, self.audit).await?;
        verify_op_log(&entries)?;
        println!("valid");
        Ok(())
    }
}
