//! 启动状态机
//!
//! `Loading → CheckingDependency → SynchronizingSchema → Listening` 是唯一的成功路径，
//! 任何非终止状态都可以进入 `Failed`。

use std::fmt;

use thiserror::Error;
use tokio::sync::watch;

/// 启动步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    LoadConfiguration,
    CheckDependency,
    SynchronizeSchema,
    BindListener,
}

impl BootstrapStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadConfiguration => "load_configuration",
            Self::CheckDependency => "check_dependency",
            Self::SynchronizeSchema => "synchronize_schema",
            Self::BindListener => "bind_listener",
        }
    }
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LoadConfiguration => "configuration loading",
            Self::CheckDependency => "database readiness check",
            Self::SynchronizeSchema => "schema synchronization",
            Self::BindListener => "listener bind",
        };
        f.write_str(label)
    }
}

/// 启动状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Loading,
    CheckingDependency,
    SynchronizingSchema,
    /// 监听已绑定，服务就绪
    Listening,
    Failed {
        step: BootstrapStep,
        reason: String,
    },
}

impl BootstrapState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::CheckingDependency => "checking_dependency",
            Self::SynchronizingSchema => "synchronizing_schema",
            Self::Listening => "listening",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Listening)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Listening | Self::Failed { .. })
    }

    pub fn can_transition_to(&self, next: &BootstrapState) -> bool {
        match (self, next) {
            (Self::Loading, Self::CheckingDependency)
            | (Self::CheckingDependency, Self::SynchronizingSchema)
            | (Self::SynchronizingSchema, Self::Listening) => true,
            (current, Self::Failed { .. }) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("Illegal bootstrap transition from {from} to {to}")]
pub struct StateError {
    pub from: BootstrapState,
    pub to: BootstrapState,
}

/// 状态机，由启动流程独占
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<BootstrapState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BootstrapState::Loading);
        Self { tx }
    }

    pub fn current(&self) -> BootstrapState {
        self.tx.borrow().clone()
    }

    /// 推进到下一个状态，非法迁移返回错误且不修改状态
    pub fn advance(&self, next: BootstrapState) -> Result<(), StateError> {
        let current = self.current();
        if !current.can_transition_to(&next) {
            return Err(StateError {
                from: current,
                to: next,
            });
        }
        self.tx.send_replace(next);
        Ok(())
    }

    /// 标记失败；已处于终止状态时保持不变
    pub fn fail(&self, step: BootstrapStep, reason: impl Into<String>) {
        let _ = self.advance(BootstrapState::Failed {
            step,
            reason: reason.into(),
        });
    }

    /// 只读句柄
    pub fn subscribe(&self) -> BootstrapStatus {
        BootstrapStatus {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 启动状态的只读视图
#[derive(Debug, Clone)]
pub struct BootstrapStatus {
    rx: watch::Receiver<BootstrapState>,
}

impl BootstrapStatus {
    pub fn current(&self) -> BootstrapState {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path() {
        let machine = StateMachine::new();
        let status = machine.subscribe();
        assert_eq!(status.current(), BootstrapState::Loading);

        machine.advance(BootstrapState::CheckingDependency).unwrap();
        machine.advance(BootstrapState::SynchronizingSchema).unwrap();
        assert!(!status.is_ready());

        machine.advance(BootstrapState::Listening).unwrap();
        assert!(status.is_ready());
        assert!(status.current().is_terminal());
    }

    #[test]
    fn test_steps_cannot_be_skipped_or_reordered() {
        let machine = StateMachine::new();

        let err = machine.advance(BootstrapState::Listening).unwrap_err();
        assert_eq!(err.from, BootstrapState::Loading);
        assert_eq!(machine.current(), BootstrapState::Loading);

        assert!(machine.advance(BootstrapState::SynchronizingSchema).is_err());

        machine.advance(BootstrapState::CheckingDependency).unwrap();
        assert!(machine.advance(BootstrapState::Loading).is_err());
        assert!(machine.advance(BootstrapState::Listening).is_err());
    }

    #[test]
    fn test_any_running_state_can_fail() {
        for path in [
            vec![],
            vec![BootstrapState::CheckingDependency],
            vec![
                BootstrapState::CheckingDependency,
                BootstrapState::SynchronizingSchema,
            ],
        ] {
            let machine = StateMachine::new();
            for state in path {
                machine.advance(state).unwrap();
            }
            machine.fail(BootstrapStep::CheckDependency, "boom");
            assert_eq!(machine.current().name(), "failed");
        }
    }

    #[test]
    fn test_failed_is_terminal() {
        let machine = StateMachine::new();
        machine.fail(BootstrapStep::LoadConfiguration, "PORT missing");
        machine.fail(BootstrapStep::BindListener, "ignored");

        assert_eq!(
            machine.current(),
            BootstrapState::Failed {
                step: BootstrapStep::LoadConfiguration,
                reason: "PORT missing".to_string(),
            }
        );
        assert!(machine.advance(BootstrapState::CheckingDependency).is_err());
    }

    #[test]
    fn test_listening_is_terminal() {
        let machine = StateMachine::new();
        machine.advance(BootstrapState::CheckingDependency).unwrap();
        machine.advance(BootstrapState::SynchronizingSchema).unwrap();
        machine.advance(BootstrapState::Listening).unwrap();

        machine.fail(BootstrapStep::BindListener, "late");
        assert!(machine.current().is_ready());
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(BootstrapStep::CheckDependency.as_str(), "check_dependency");
        assert_eq!(
            BootstrapStep::SynchronizeSchema.to_string(),
            "schema synchronization"
        );
    }
}
