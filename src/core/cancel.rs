/// How an active procedure call should be canceled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CallCancelMode {
    /// An ERROR is sent immediately back to the caller. The callee receives no INTERRUPT.
    #[default]
    Skip,
    /// INTERRUPT is sent to the callee, and the caller waits for acknowledgement in the form of an
    /// ERROR or RESULT.
    Kill,
    /// INTERRUPT is sent to the callee, and an ERROR is sent immediately back to the caller.
    KillNoWait,
}

impl TryFrom<&str> for CallCancelMode {
    type Error = anyhow::Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "skip" => Ok(Self::Skip),
            "kill" => Ok(Self::Kill),
            "killnowait" => Ok(Self::KillNoWait),
            _ => Err(Self::Error::msg(format!(
                "invalid call cancel mode: {value}"
            ))),
        }
    }
}

impl From<CallCancelMode> for &'static str {
    fn from(value: CallCancelMode) -> Self {
        match value {
            CallCancelMode::Skip => "skip",
            CallCancelMode::Kill => "kill",
            CallCancelMode::KillNoWait => "killnowait",
        }
    }
}

impl From<CallCancelMode> for String {
    fn from(value: CallCancelMode) -> Self {
        Into::<&'static str>::into(value).to_owned()
    }
}
