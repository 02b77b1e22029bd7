//! Semantic equivalence between statement trees.
//!
//! Identifiers, line numbers and script metadata are ignored. `None` equals
//! only `None`. Floats compare within [`FLOAT_TOLERANCE`]. Booleans compare
//! exactly except the `expression` flag of `jump`/`call`, where anything but
//! `Some(true)` means a plain label name. Code carried by `python` and `raw`
//! statements is compared without blank lines and full-line comments, which
//! the scanner drops.

use crate::ast::{Branch, Choice, Script, Stmt, StmtKind};

pub const FLOAT_TOLERANCE: f64 = 1e-6;

impl Script {
    /// Whether `self` and `other` hold equivalent statements.
    pub fn equivalent(&self, other: &Script) -> bool {
        equivalent(&self.body, &other.body)
    }
}

impl Stmt {
    pub fn equivalent(&self, other: &Stmt) -> bool {
        kind_equivalent(&self.kind, &other.kind)
    }
}

/// Order-sensitive, recursive comparison of two statement lists.
pub fn equivalent(a: &[Stmt], b: &[Stmt]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
}

fn float_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => (x - y).abs() <= FLOAT_TOLERANCE,
        _ => false,
    }
}

fn expr_flag(flag: Option<bool>) -> bool {
    flag.unwrap_or(false)
}

fn code_lines(code: &str) -> impl Iterator<Item = &str> {
    code.lines().map(str::trim_end).filter(|l| {
        let t = l.trim_start();
        !t.is_empty() && !t.starts_with('#')
    })
}

fn code_eq(a: &str, b: &str) -> bool {
    code_lines(a).eq(code_lines(b))
}

fn choices_eq(a: &[Choice], b: &[Choice]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.text == y.text && x.condition == y.condition && equivalent(&x.body, &y.body)
        })
}

fn branches_eq(a: &[Branch], b: &[Branch]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.condition == y.condition && equivalent(&x.body, &y.body))
}

fn kind_equivalent(a: &StmtKind, b: &StmtKind) -> bool {
    use StmtKind::*;
    match (a, b) {
        (
            Label { name, params, body },
            Label {
                name: n2,
                params: p2,
                body: b2,
            },
        ) => name == n2 && params == p2 && equivalent(body, b2),
        (
            Dialogue {
                speaker,
                text,
                extras,
            },
            Dialogue {
                speaker: s2,
                text: t2,
                extras: e2,
            },
        ) => speaker == s2 && text == t2 && extras == e2,
        (Menu { choices, extras }, Menu { choices: c2, extras: e2 }) => {
            extras == e2 && choices_eq(choices, c2)
        }
        (Scene { image, extras }, Scene { image: i2, extras: e2 }) => image == i2 && extras == e2,
        (Show { image, extras }, Show { image: i2, extras: e2 })
        | (Hide { image, extras }, Hide { image: i2, extras: e2 }) => image == i2 && extras == e2,
        (With { transition }, With { transition: t2 }) => transition == t2,
        (Jump { target, expression }, Jump { target: t2, expression: x2 }) => {
            target == t2 && expr_flag(*expression) == expr_flag(*x2)
        }
        (
            Call {
                target,
                expression,
                args,
                from,
            },
            Call {
                target: t2,
                expression: x2,
                args: a2,
                from: f2,
            },
        ) => {
            target == t2 && expr_flag(*expression) == expr_flag(*x2) && args == a2 && from == f2
        }
        (Return { value }, Return { value: v2 }) => value == v2,
        (If { branches }, If { branches: b2 }) => branches_eq(branches, b2),
        (Set { var, op, value }, Set { var: v2, op: o2, value: x2 }) => {
            var == v2 && op == o2 && value == x2
        }
        (Python { code, early, hide }, Python { code: c2, early: e2, hide: h2 }) => {
            early == e2 && hide == h2 && code_eq(code, c2)
        }
        (Define { name, value, store }, Define { name: n2, value: v2, store: s2 }) => {
            name == n2 && value == v2 && store == s2
        }
        (Default { name, value }, Default { name: n2, value: v2 }) => name == n2 && value == v2,
        (
            Play {
                channel,
                file,
                options,
            },
            Play {
                channel: c2,
                file: f2,
                options: o2,
            },
        ) => {
            channel == c2
                && file == f2
                && float_eq(options.fade_in, o2.fade_in)
                && float_eq(options.volume, o2.volume)
                && options.r#loop == o2.r#loop
                && options.queue == o2.queue
        }
        (Stop { channel, fade_out }, Stop { channel: c2, fade_out: f2 }) => {
            channel == c2 && float_eq(*fade_out, *f2)
        }
        (Pause { duration }, Pause { duration: d2 }) => float_eq(*duration, *d2),
        (Nvl { action }, Nvl { action: a2 }) => action == a2,
        (Raw { content }, Raw { content: c2 }) => code_eq(content, c2),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AudioChannel;
    use crate::id::{IdGen, NodeFactory};

    #[test]
    fn ids_and_lines_are_ignored() {
        let ids = IdGen::new();
        let f = NodeFactory::new(&ids);
        let a = f.jump("start");
        let mut b = f.jump("start");
        b.line = Some(12);
        assert_ne!(a.id, b.id);
        assert!(a.equivalent(&b));
    }

    #[test]
    fn expression_flag_absent_equals_false() {
        let ids = IdGen::new();
        let f = NodeFactory::new(&ids);
        let a = f.jump("start");
        let mut b = f.jump("start");
        b.kind = StmtKind::Jump {
            target: "start".into(),
            expression: Some(false),
        };
        assert!(a.equivalent(&b));
        assert!(!a.equivalent(&f.jump_expression("start")));
    }

    #[test]
    fn floats_use_tolerance_but_none_is_distinct() {
        let ids = IdGen::new();
        let f = NodeFactory::new(&ids);
        assert!(f.pause(Some(1.0)).equivalent(&f.pause(Some(1.0 + 1e-9))));
        assert!(!f.pause(Some(1.0)).equivalent(&f.pause(None)));
        assert!(!f
            .stop(AudioChannel::Music, Some(1.0))
            .equivalent(&f.stop(AudioChannel::Sound, Some(1.0))));
    }
}
