//! High-level abstract syntax tree (AST) for the visual-novel scripting language.
//!
//! Every statement is a [`Stmt`]: a synthetic [`NodeId`], the source line it was
//! parsed from (absent for nodes built by the [`NodeFactory`](crate::id::NodeFactory)),
//! and the statement itself as a [`StmtKind`].
//!
//! Optional fields follow one rule throughout: `None` and an empty `Vec` mean
//! "not written in the source", and the generator emits nothing for them.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Version of the AST layout produced by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// The root node of every parsed script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub meta: ScriptMeta,
    pub body: Vec<Stmt>,
}

/// Bookkeeping attached to a [`Script`]. Never compared for equivalence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptMeta {
    pub file: Option<String>,
    pub parsed_at: Option<SystemTime>,
    pub format_version: u32,
}

impl Default for ScriptMeta {
    fn default() -> Self {
        Self {
            file: None,
            parsed_at: None,
            format_version: FORMAT_VERSION,
        }
    }
}

impl Script {
    /// A script with default metadata, for programmatic construction.
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            meta: ScriptMeta::default(),
            body,
        }
    }
}

/// A single statement in the DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub line: Option<usize>,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Defines a label that can be jumped to or called.
    Label {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    /// A line of dialogue. `speaker == None` is narration.
    Dialogue {
        speaker: Option<String>,
        text: String,
        extras: DialogueExtras,
    },
    /// Displays a menu of choices to the player.
    Menu {
        choices: Vec<Choice>,
        extras: MenuExtras,
    },
    /// Replaces the scene, clearing every shown image.
    Scene {
        image: Option<String>,
        extras: ImageExtras,
    },
    /// Displays or updates an image.
    Show { image: String, extras: ImageExtras },
    /// Removes a previously shown image.
    Hide { image: String, extras: ImageExtras },
    With { transition: String },
    /// Unconditional jump to another label.
    Jump {
        target: String,
        expression: Option<bool>,
    },
    /// Calls a label as a subroutine, returning afterward.
    Call {
        target: String,
        expression: Option<bool>,
        args: Vec<String>,
        from: Option<String>,
    },
    Return { value: Option<String> },
    /// `if` / `elif` / `else` chain. An `else` branch has `condition == None`.
    If { branches: Vec<Branch> },
    /// One-line assignment: `$ var op value`.
    Set {
        var: String,
        op: AssignOp,
        value: String,
    },
    /// Python code, either a `python:` block or a `$` line that is not an assignment.
    Python { code: String, early: bool, hide: bool },
    Define {
        name: String,
        value: String,
        store: Option<String>,
    },
    Default { name: String, value: String },
    Play {
        channel: AudioChannel,
        file: String,
        options: AudioOptions,
    },
    Stop {
        channel: AudioChannel,
        fade_out: Option<f64>,
    },
    Pause { duration: Option<f64> },
    Nvl { action: NvlAction },
    /// Source the parser does not understand, kept verbatim. Lines after the first
    /// keep their indentation relative to the first line.
    Raw { content: String },
}

impl StmtKind {
    /// Short tag used in logs and diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            StmtKind::Label { .. } => "label",
            StmtKind::Dialogue { .. } => "dialogue",
            StmtKind::Menu { .. } => "menu",
            StmtKind::Scene { .. } => "scene",
            StmtKind::Show { .. } => "show",
            StmtKind::Hide { .. } => "hide",
            StmtKind::With { .. } => "with",
            StmtKind::Jump { .. } => "jump",
            StmtKind::Call { .. } => "call",
            StmtKind::Return { .. } => "return",
            StmtKind::If { .. } => "if",
            StmtKind::Set { .. } => "set",
            StmtKind::Python { .. } => "python",
            StmtKind::Define { .. } => "define",
            StmtKind::Default { .. } => "default",
            StmtKind::Play { .. } => "play",
            StmtKind::Stop { .. } => "stop",
            StmtKind::Pause { .. } => "pause",
            StmtKind::Nvl { .. } => "nvl",
            StmtKind::Raw { .. } => "raw",
        }
    }
}

/// Rarely used dialogue fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueExtras {
    pub attributes: Vec<String>,
    pub transition: Option<String>,
    /// `extend "..."`: continues the previous line of dialogue.
    pub extend: bool,
}

/// A single selectable option inside a `Menu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub condition: Option<String>,
    pub body: Vec<Stmt>,
}

/// Text shown while a menu is waiting for a choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuExtras {
    pub prompt: Option<Prompt>,
    /// `set <var>` clause.
    pub result_var: Option<String>,
    /// `menu (screen="...")` header argument.
    pub screen: Option<String>,
}

/// Clauses shared by `scene`, `show` and `hide`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageExtras {
    pub attributes: Vec<String>,
    pub position: Option<String>,
    pub layer: Option<String>,
    pub zorder: Option<i64>,
    pub as_tag: Option<String>,
    pub behind: Option<String>,
    pub transition: Option<String>,
}

/// One arm of an `If`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    #[default]
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitOr,
    BitAnd,
    BitXor,
}

impl AssignOp {
    pub const ALL: [AssignOp; 11] = [
        AssignOp::Assign,
        AssignOp::Add,
        AssignOp::Sub,
        AssignOp::Mul,
        AssignOp::Div,
        AssignOp::FloorDiv,
        AssignOp::Mod,
        AssignOp::Pow,
        AssignOp::BitOr,
        AssignOp::BitAnd,
        AssignOp::BitXor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::FloorDiv => "//=",
            AssignOp::Mod => "%=",
            AssignOp::Pow => "**=",
            AssignOp::BitOr => "|=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitXor => "^=",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

/// Available audio channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioChannel {
    Music,
    Sound,
    Voice,
}

impl AudioChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioChannel::Music => "music",
            AudioChannel::Sound => "sound",
            AudioChannel::Voice => "voice",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "music" => Some(AudioChannel::Music),
            "sound" => Some(AudioChannel::Sound),
            "voice" => Some(AudioChannel::Voice),
            _ => None,
        }
    }
}

/// Fine-grained configuration for a `play` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioOptions {
    pub fade_in: Option<f64>,
    pub volume: Option<f64>,
    /// `Some(true)` for `loop`, `Some(false)` for `noloop`.
    pub r#loop: Option<bool>,
    /// Written as `queue <channel> ...` instead of `play <channel> ...`.
    pub queue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NvlAction {
    Show,
    Hide,
    Clear,
}

impl NvlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NvlAction::Show => "show",
            NvlAction::Hide => "hide",
            NvlAction::Clear => "clear",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "show" => Some(NvlAction::Show),
            "hide" => Some(NvlAction::Hide),
            "clear" => Some(NvlAction::Clear),
            _ => None,
        }
    }
}
