use std::io::Read;

use anyhow::Context;
use didplc::client::Client;
use didplc::keys::PrivateKey;
use didplc::operation::Operation;

use crate::cli::Submit;

impl Submit {
    pub(crate) async fn run(&self, client: &Client) -> anyhow::Result<()> {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read operation from stdin")?;
        let mut op: Operation =
            serde_json::from_str(&input).context("stdin is not an operation JSON object")?;

        if !op.is_signed() {
            let rotation_key = self
                .rotation_key
                .as_deref()
                .context("operation is not signed and no private key provided")?;
            let private = PrivateKey::from_multibase(rotation_key)?;
            op.sign(&private)?;
        }

        let entry = client.submit(&self.did, &op).await?;
        println!("{}", serde_json::to_string(&entry)?);
        Ok(())
    }
}
