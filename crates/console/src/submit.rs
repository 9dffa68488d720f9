//! Create-vs-update dispatch for an assembled node document.

use tracing::info;

use crate::api::NodeApi;
use crate::error::ConsoleResult;
use crate::model::NodeConfiguration;
use crate::wizard::WizardMode;

/// Send `doc` to the backend. Edit mode updates the node keyed by the id
/// captured when the wizard was opened.
pub async fn submit<A: NodeApi>(
    api: &A,
    mode: &WizardMode,
    doc: &NodeConfiguration,
) -> ConsoleResult<NodeConfiguration> {
    match mode {
        WizardMode::Create => {
            let saved = api.create_node(doc).await?;
            info!(node_id = %saved.identity.node_id, "node created");
            Ok(saved)
        }
        WizardMode::Edit { node_id } => {
            let saved = api.update_node(node_id, doc).await?;
            info!(node_id = %node_id, "node updated");
            Ok(saved)
        }
    }
}
