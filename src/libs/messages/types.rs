use crate::libs::engine::{ChannelId, LabelId, MemberId, MessageId, TimerId};

#[derive(Debug, Clone)]
pub enum Message {
    // === STAGE ANNOUNCEMENTS ===
    StageFinished(String), // stage name
    StageStarting {
        name: String,
        duration: u32,
        message: String,
    },
    PleaseRespond,
    InactivityWarning(String), // joined mentions
    InactivityRemoved(String), // joined mentions

    // === DIRECT NOTIFICATIONS ===
    DirectRemoved {
        timer: String,
        channel: ChannelId,
        clocked: String,
    },
    DirectWarning {
        timer: String,
        channel: ChannelId,
        main_line: String,
    },
    DirectStatus {
        timer: String,
        channel: ChannelId,
        main_line: String,
    },

    // === SUBSCRIPTION MESSAGES ===
    Welcome {
        timer: String,
        member: MemberId,
    },
    WelcomeRunning {
        stage: String,
        remaining: String,
        message: String,
    },
    WelcomeStopped,
    Goodbye {
        member: MemberId,
        clocked: String,
    },
    GrantForbidden {
        member: MemberId,
        timer: TimerId,
    },

    // === STATUS RENDERING ===
    StatusTitle,
    StatusPostForbidden,
    PinPermissionRequired,
    TimerNotRunning,
    TimerNotSetUp,
    TimerPausedMark,
    NoMembers,
    SummaryRunning,
    SummaryPaused,
    SummaryStopped,
    OnelineSummary {
        name: String,
        status: String,
        members: String,
        pattern: String,
    },

    // === PATTERN MESSAGES ===
    NoPatternProvided,
    PatternSingleStage,
    PatternBadBlock(String),
    PatternBadDuration(String),
    PatternBadDurationInBlock {
        token: String,
        block: String,
    },
    PresetUnknown(String),
    PatternLoadFailed(String),

    // === ENGINE ERRORS ===
    TimerIsNotRunning,
    TimerIsNotSetUp,
    InvalidSkipCount {
        count: usize,
        max: usize,
    },
    MemberNotSubscribed(MemberId),
    UnknownTimer(TimerId),

    // === ENGINE LOG MESSAGES ===
    EngineStarting,
    EngineStopped,
    TimersLoaded(usize),
    TimerCreated {
        id: TimerId,
        name: String,
    },
    TimerDestroyed(TimerId),
    TimerMoved {
        id: TimerId,
        channel: ChannelId,
    },
    TimersStarted(usize),
    StageChangeFailed {
        timer: TimerId,
        error: String,
    },
    StatusUpdateFailed {
        channel: ChannelId,
        error: String,
    },
    SessionSaveFailed(String),
    HistorySaveFailed(String),
    SnapshotWritten(String),
    SnapshotWriteFailed(String),
    SnapshotRestored(usize),
    SnapshotCorrupt(String),
    SnapshotTimerSkipped {
        timer: TimerId,
        error: String,
    },

    // === CONSOLE MESSENGER ===
    ConsolePost {
        channel: ChannelId,
        message: MessageId,
        text: String,
    },
    ConsoleEdit {
        channel: ChannelId,
        message: MessageId,
        text: String,
    },
    ConsolePin {
        channel: ChannelId,
        message: MessageId,
    },
    ConsoleMarkers {
        message: MessageId,
        markers: String,
    },
    ConsoleDirect {
        member: MemberId,
        text: String,
    },
    ConsoleRename {
        label: LabelId,
        name: String,
    },
    ConsoleGrant {
        member: MemberId,
        tag: TimerId,
    },
    ConsoleRevoke {
        member: MemberId,
        tag: TimerId,
    },
    ConsoleAlert(LabelId),

    // === CONFIG MESSAGES ===
    ConfigSaved,
    ConfigModuleEngine,
    PromptSelectModules,
    PromptMaxWarnings,
    PromptDefaultPattern,
    PromptMinSessionDuration,
    PromptStatusBudget,
    PromptSaveInterval,
    PromptPinFailureThreshold,

    // === MIGRATION MESSAGES ===
    MigrationsFound(usize),
    RunningMigration(u32, String),
    MigrationCompleted(u32),
    MigrationFailed(u32, String),
    AllMigrationsCompleted,
    SchemaVersion { current: u32, latest: u32 },
    DatabaseUpToDate,
    NoMigrationsApplied,

    // === SIGNAL MESSAGES ===
    ReceivedSigterm,
    ReceivedSigint,
    ReceivedCtrlC,
    CtrlCListenFailed(String),
    SignalHandlerFailed(String),
    SignalHandlingNotSupported,

    // === CLI MESSAGES ===
    PatternIdentity(String),
    PresetScopeRequired,
    PresetSaved(String),
    PresetDeleted(String),
    PresetNotFound(String),
    NoPresets,
    NoTimers,
    TimerSaved(TimerId),
    TimerRemoved(TimerId),
    TimerNotFound(TimerId),
    NoPatternHistory(TimerId),
    NoSessions,
    SessionsTotal {
        count: usize,
        duration: String,
        focused: String,
    },
    SnapshotMissing(String),
    NotifyLevelSet {
        member: MemberId,
        level: String,
    },
    NotifyLevelCurrent {
        member: String,
        level: String,
    },
}
