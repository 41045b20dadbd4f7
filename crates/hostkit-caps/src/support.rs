//! Shared execution helpers

use hostkit_exec::{Charset, Command, ControlsOverride, ExecutionResult, Host};

use crate::error::CapabilityError;

/// Run a command whose output is parsed as text
pub(crate) async fn text<H>(host: &H, command: Command) -> Result<ExecutionResult, CapabilityError>
where
    H: Host + ?Sized,
{
    let _utf8 = host.set_controls(&ControlsOverride::new().decode(Charset::Utf8));
    Ok(host.execute(command).await?)
}

/// Run a text command and require success
pub(crate) async fn checked<H>(
    host: &H,
    command: Command,
) -> Result<ExecutionResult, CapabilityError>
where
    H: Host + ?Sized,
{
    let result = text(host, command).await?;
    if result.success {
        Ok(result)
    } else {
        Err(CapabilityError::from_result(&result))
    }
}

/// Answer of a `test`-style predicate: 0 is true, 1 is false
pub(crate) fn predicate(result: &ExecutionResult) -> Result<bool, CapabilityError> {
    match result.status {
        0 => Ok(true),
        1 => Ok(false),
        _ => Err(CapabilityError::from_result(result)),
    }
}
