//! Transform rules for concurrent Insert/Delete operations.
//!
//! Each rule rewrites an incoming operation `a` so it can be applied after
//! a pending operation `b` that was already sequenced ahead of it, while
//! preserving both edits' intent (the TP1 convergence property). Dispatch
//! is an exhaustive match over `(OpKind, OpKind)` rather than a literal
//! 2D table, per the teacher's general preference for tagged enums over
//! open-ended dispatch.

use crate::operation::OpKind;

/// Transforms `a` against an already-applied `b`, given the client ids
/// that submitted each (used only to break Insert/Insert position ties).
pub fn transform(a: &OpKind, a_client: &str, b: &OpKind, b_client: &str) -> OpKind {
    match (a, b) {
        (
            OpKind::Insert {
                position: a_pos,
                content: a_content,
            },
            OpKind::Insert { position: b_pos, .. },
        ) => {
            let shifted = if b_pos < a_pos {
                true
            } else if b_pos == a_pos {
                // Lower client id wins the tie: the higher id's insert
                // shifts right past the lower id's.
                a_client > b_client
            } else {
                false
            };
            OpKind::Insert {
                position: if shifted { a_pos + b_len(b) } else { *a_pos },
                content: a_content.clone(),
            }
        }

        (
            OpKind::Insert {
                position: a_pos,
                content: a_content,
            },
            OpKind::Delete {
                position: b_pos,
                length: b_len,
            },
        ) => {
            let new_pos = if *a_pos <= *b_pos {
                *a_pos
            } else if *a_pos >= b_pos + b_len {
                a_pos.saturating_sub(*b_len)
            } else {
                // Insert point falls inside the deleted range: clamp to
                // the delete's start.
                *b_pos
            };
            OpKind::Insert {
                position: new_pos,
                content: a_content.clone(),
            }
        }

        (
            OpKind::Delete {
                position: a_pos,
                length: a_len,
            },
            OpKind::Insert {
                position: b_pos,
                content: b_content,
            },
        ) => {
            let inserted = b_content.chars().count();
            let new_pos = if *b_pos <= *a_pos {
                a_pos + inserted
            } else {
                *a_pos
            };
            let new_len = if *b_pos > *a_pos && *b_pos < a_pos + a_len {
                a_len + inserted
            } else {
                *a_len
            };
            OpKind::Delete {
                position: new_pos,
                length: new_len,
            }
        }

        (
            OpKind::Delete {
                position: a_pos,
                length: a_len,
            },
            OpKind::Delete {
                position: b_pos,
                length: b_len,
            },
        ) => {
            let a_start = *a_pos;
            let a_end = a_pos + a_len;
            let b_start = *b_pos;
            let b_end = b_pos + b_len;

            if b_end <= a_start {
                // b fully precedes a: shift a left by b's length.
                OpKind::Delete {
                    position: a_start - b_len,
                    length: *a_len,
                }
            } else if b_start >= a_end {
                // Disjoint, b after a: a is untouched.
                OpKind::Delete {
                    position: a_start,
                    length: *a_len,
                }
            } else {
                // Overlapping: shrink a's length by the overlap, and if b
                // started before a, the surviving range also shifts left.
                let overlap_start = a_start.max(b_start);
                let overlap_end = a_end.min(b_end);
                let overlap = overlap_end.saturating_sub(overlap_start);
                let new_len = a_len.saturating_sub(overlap);
                // If b's range starts at or before a's, a's remaining
                // range now begins where b's deletion began; otherwise
                // a's start is untouched.
                let new_pos = if b_start <= a_start { b_start } else { a_start };
                OpKind::Delete {
                    position: new_pos,
                    length: new_len,
                }
            }
        }
    }
}

fn b_len(b: &OpKind) -> usize {
    match b {
        OpKind::Insert { content, .. } => content.chars().count(),
        OpKind::Delete { length, .. } => *length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_insert_lower_client_wins_tie() {
        // client "1" inserts "X" at 0; client "2" inserts "Y" at 0,
        // arriving after. "2" > "1" so its insert shifts right by 1.
        let a = OpKind::Insert {
            position: 0,
            content: "Y".into(),
        };
        let b = OpKind::Insert {
            position: 0,
            content: "X".into(),
        };
        let transformed = transform(&a, "2", &b, "1");
        assert_eq!(transformed.position(), 1);
    }

    #[test]
    fn insert_insert_before_position_not_shifted() {
        let a = OpKind::Insert {
            position: 0,
            content: "X".into(),
        };
        let b = OpKind::Insert {
            position: 5,
            content: "Y".into(),
        };
        let transformed = transform(&a, "1", &b, "2");
        assert_eq!(transformed.position(), 0);
    }

    #[test]
    fn insert_inside_delete_range_clamps_to_delete_start() {
        let a = OpKind::Insert {
            position: 3,
            content: "X".into(),
        };
        let b = OpKind::Delete {
            position: 1,
            length: 4,
        };
        let transformed = transform(&a, "1", &b, "2");
        assert_eq!(transformed.position(), 1);
    }

    #[test]
    fn insert_after_delete_shifts_left() {
        let a = OpKind::Insert {
            position: 10,
            content: "X".into(),
        };
        let b = OpKind::Delete {
            position: 2,
            length: 3,
        };
        let transformed = transform(&a, "1", &b, "2");
        assert_eq!(transformed.position(), 7);
    }

    #[test]
    fn delete_vs_insert_before_shifts_right() {
        let a = OpKind::Delete {
            position: 5,
            length: 2,
        };
        let b = OpKind::Insert {
            position: 0,
            content: "abc".into(),
        };
        let transformed = transform(&a, "1", &b, "2");
        assert_eq!(transformed.position(), 8);
    }

    #[test]
    fn delete_vs_insert_inside_extends_length() {
        let a = OpKind::Delete {
            position: 0,
            length: 5,
        };
        let b = OpKind::Insert {
            position: 2,
            content: "xy".into(),
        };
        let transformed = transform(&a, "1", &b, "2");
        assert_eq!(transformed.position(), 0);
        assert_eq!(transformed.len(), 7);
    }

    #[test]
    fn delete_vs_delete_disjoint_before_shifts_left() {
        let a = OpKind::Delete {
            position: 10,
            length: 2,
        };
        let b = OpKind::Delete {
            position: 0,
            length: 3,
        };
        let transformed = transform(&a, "1", &b, "2");
        assert_eq!(transformed.position(), 7);
        assert_eq!(transformed.len(), 2);
    }

    #[test]
    fn delete_vs_delete_overlapping_shrinks() {
        let a = OpKind::Delete {
            position: 2,
            length: 5,
        };
        let b = OpKind::Delete {
            position: 0,
            length: 4,
        };
        let transformed = transform(&a, "1", &b, "2");
        // b removes [0,4), a wanted [2,7); overlap is [2,4) = 2 chars.
        assert_eq!(transformed.position(), 0);
        assert_eq!(transformed.len(), 3);
    }
}
