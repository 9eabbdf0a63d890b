//! Reason vocabularies that mark a container or event as failing

use std::fmt;
use std::str::FromStr;

/// Waiting-state reasons that indicate a broken container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerErrorReason {
    CrashLoopBackOff,
    ImagePullBackOff,
    CreateContainerConfigError,
    PreCreateHookError,
    CreateContainerError,
    PreStartHookError,
    RunContainerError,
    ImageInspectError,
    ErrImagePull,
    ErrImageNeverPull,
    InvalidImageName,
}

impl ContainerErrorReason {
    pub const ALL: [ContainerErrorReason; 11] = [
        ContainerErrorReason::CrashLoopBackOff,
        ContainerErrorReason::ImagePullBackOff,
        ContainerErrorReason::CreateContainerConfigError,
        ContainerErrorReason::PreCreateHookError,
        ContainerErrorReason::CreateContainerError,
        ContainerErrorReason::PreStartHookError,
        ContainerErrorReason::RunContainerError,
        ContainerErrorReason::ImageInspectError,
        ContainerErrorReason::ErrImagePull,
        ContainerErrorReason::ErrImageNeverPull,
        ContainerErrorReason::InvalidImageName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerErrorReason::CrashLoopBackOff => "CrashLoopBackOff",
            ContainerErrorReason::ImagePullBackOff => "ImagePullBackOff",
            ContainerErrorReason::CreateContainerConfigError => "CreateContainerConfigError",
            ContainerErrorReason::PreCreateHookError => "PreCreateHookError",
            ContainerErrorReason::CreateContainerError => "CreateContainerError",
            ContainerErrorReason::PreStartHookError => "PreStartHookError",
            ContainerErrorReason::RunContainerError => "RunContainerError",
            ContainerErrorReason::ImageInspectError => "ImageInspectError",
            ContainerErrorReason::ErrImagePull => "ErrImagePull",
            ContainerErrorReason::ErrImageNeverPull => "ErrImageNeverPull",
            ContainerErrorReason::InvalidImageName => "InvalidImageName",
        }
    }

    pub fn is_error(reason: &str) -> bool {
        reason.parse::<Self>().is_ok()
    }
}

impl FromStr for ContainerErrorReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        Self::ALL.into_iter().find(|r| r.as_str() == s).ok_or(())
    }
}

impl fmt::Display for ContainerErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event reasons worth surfacing for a pod stuck in ContainerCreating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventErrorReason {
    FailedCreatePodSandBox,
    FailedMount,
}

impl EventErrorReason {
    pub const ALL: [EventErrorReason; 2] = [
        EventErrorReason::FailedCreatePodSandBox,
        EventErrorReason::FailedMount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventErrorReason::FailedCreatePodSandBox => "FailedCreatePodSandBox",
            EventErrorReason::FailedMount => "FailedMount",
        }
    }

    pub fn is_error(reason: &str) -> bool {
        reason.parse::<Self>().is_ok()
    }
}

impl FromStr for EventErrorReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        Self::ALL.into_iter().find(|r| r.as_str() == s).ok_or(())
    }
}

impl fmt::Display for EventErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
