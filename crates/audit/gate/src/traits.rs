use async_trait::async_trait;

use crate::context::{GateVerdict, OperationContext};
use crate::error::GateError;
use crate::policy::GatePolicy;

/// A named policy evaluator.
///
/// A gate instance is configured once with its [`GatePolicy`] before it joins
/// a pipeline, and is then evaluated concurrently with the other gates of its
/// stage. `configure` is where malformed policies are rejected; `evaluate`
/// only reports verdicts (or, exceptionally, an evaluation failure).
#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> &str;

    fn configure(&mut self, policy: &GatePolicy) -> Result<(), GateError>;

    async fn evaluate(&self, ctx: &OperationContext) -> Result<GateVerdict, GateError>;
}
