//! Ledger of header regions recorded while a container is parsed or
//! written. It never influences sample I/O; it exists so a file's layout can
//! be checked and printed.

use super::ids::{self, ChunkID};
use log::warn;
use std::fmt::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEnd {
    /// Last byte of the region (inclusive).
    At(u64),
    ToEndOfFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRegion {
    pub id: ChunkID,
    pub start: u64,
    pub end: ChunkEnd,
}

impl ChunkRegion {
    // one past the last byte
    fn limit(&self, eof: u64) -> u64 {
        match self.end {
            ChunkEnd::At(last) => last + 1,
            ChunkEnd::ToEndOfFile => eof,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Unaccounted bytes between the previous region and this one.
    Gap { id: ChunkID, from: u64, to: u64 },
    /// Region starts before the previous one at its level ends.
    Overlap { id: ChunkID, start: u64, prev_end: u64 },
    /// Region runs past the end of its enclosing region.
    Overrun { id: ChunkID, end: u64, parent_end: u64 },
    /// Bytes after the last top-level region.
    Trailing { from: u64, to: u64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::Gap { id, from, to } => write!(
                f,
                "{} bytes unaccounted for before chunk \"{}\" ({}..{})",
                to - from,
                ids::display(id),
                from,
                to
            ),
            Diagnostic::Overlap { id, start, prev_end } => write!(
                f,
                "chunk \"{}\" at {} overlaps previous chunk ending at {}",
                ids::display(id),
                start,
                prev_end
            ),
            Diagnostic::Overrun { id, end, parent_end } => write!(
                f,
                "chunk \"{}\" ends at {}, past its container end {}",
                ids::display(id),
                end,
                parent_end
            ),
            Diagnostic::Trailing { from, to } => {
                write!(f, "{} trailing bytes after last chunk", to - from)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkLedger {
    regions: Vec<ChunkRegion>,
}

struct Open {
    start: u64,
    end: u64,
    // end of the last child seen; None until the first child
    next: Option<u64>,
}

impl ChunkLedger {
    pub fn new() -> ChunkLedger {
        ChunkLedger::default()
    }

    /// Record the half-open byte range `[start, end)`. Empty ranges are
    /// ignored.
    pub fn record(&mut self, id: &[u8], start: u64, end: u64) {
        if end <= start {
            return;
        }
        self.regions.push(ChunkRegion {
            id: ids::padded(id),
            start,
            end: ChunkEnd::At(end - 1),
        });
    }

    /// Record a region running from `start` to the end of the file.
    pub fn record_to_eof(&mut self, id: &[u8], start: u64) {
        self.regions.push(ChunkRegion {
            id: ids::padded(id),
            start,
            end: ChunkEnd::ToEndOfFile,
        });
    }

    pub fn regions(&self) -> &[ChunkRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Check nesting, gaps and overlaps. `file_size` closes the implicit
    /// top-level region; without it only internal consistency is checked.
    pub fn validate(&self, file_size: Option<u64>) -> Vec<Diagnostic> {
        self.walk(file_size).1
    }

    /// Indented listing of the regions followed by any diagnostics.
    pub fn render(&self, file_size: Option<u64>) -> String {
        let eof = file_size.unwrap_or(u64::MAX);
        let (depths, diags) = self.walk(file_size);
        let mut out = String::new();
        for (region, depth) in self.regions.iter().zip(depths) {
            let end = match region.end {
                ChunkEnd::At(last) => last.to_string(),
                ChunkEnd::ToEndOfFile if file_size.is_some() => {
                    eof.saturating_sub(1).to_string()
                }
                ChunkEnd::ToEndOfFile => "EOF".to_string(),
            };
            let _ = writeln!(
                out,
                "{:indent$}{}: <{}, {}>",
                "",
                ids::display(&region.id),
                region.start,
                end,
                indent = 2 * depth
            );
        }
        for d in &diags {
            let _ = writeln!(out, "warning: {}", d);
        }
        out
    }

    /// Emit every diagnostic as a log warning.
    pub fn warn_diagnostics(&self, file_size: Option<u64>) {
        for d in self.validate(file_size) {
            warn!("{}", d);
        }
    }

    // Single pass over the regions in record order, keeping a stack of open
    // regions. Returns the nesting depth of each region and the diagnostics.
    fn walk(&self, file_size: Option<u64>) -> (Vec<usize>, Vec<Diagnostic>) {
        let eof = file_size.unwrap_or(u64::MAX);
        let mut stack = vec![Open {
            start: 0,
            end: eof,
            next: Some(0),
        }];
        let mut depths = Vec::with_capacity(self.regions.len());
        let mut diags = Vec::new();

        for region in &self.regions {
            let (start, end) = (region.start, region.limit(eof));

            while stack.len() > 1 {
                let top = &stack[stack.len() - 1];
                if top.start <= start && end <= top.end {
                    break;
                }
                stack.pop();
            }

            let depth = stack.len() - 1;
            let parent = match stack.last_mut() {
                Some(p) => p,
                None => break,
            };
            if end > parent.end {
                diags.push(Diagnostic::Overrun {
                    id: region.id,
                    end,
                    parent_end: parent.end,
                });
            }
            match parent.next {
                Some(prev) if start > prev => diags.push(Diagnostic::Gap {
                    id: region.id,
                    from: prev,
                    to: start,
                }),
                Some(prev) if start < prev => {
                    diags.push(Diagnostic::Overlap {
                        id: region.id,
                        start,
                        prev_end: prev,
                    })
                }
                _ => (),
            }
            parent.next = Some(parent.next.map_or(end, |prev| prev.max(end)));

            depths.push(depth);
            stack.push(Open {
                start,
                end,
                next: None,
            });
        }

        if let (Some(size), Some(next)) = (file_size, stack[0].next) {
            if next < size {
                diags.push(Diagnostic::Trailing {
                    from: next,
                    to: size,
                });
            }
        }

        (depths, diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn au_ledger(n: u64) -> ChunkLedger {
        let mut ledger = ChunkLedger::new();
        ledger.record(b".snd", 0, 8);
        ledger.record(b"hdr", 8, 44);
        ledger.record(b"data", 44, 44 + n);
        ledger
    }

    #[test]
    fn clean_au_layout() {
        let ledger = au_ledger(100);
        assert!(ledger.validate(Some(144)).is_empty());
        assert!(ledger.validate(None).is_empty());
        assert_eq!(ledger.regions()[1].id, *b"hdr ");
    }

    #[test]
    fn injected_region_overlaps() {
        let mut ledger = au_ledger(100);
        ledger.record(b"bad", 10, 20);
        let diags = ledger.validate(Some(144));
        assert_eq!(
            diags,
            vec![Diagnostic::Overlap {
                id: *b"bad ",
                start: 10,
                prev_end: 144
            }]
        );
    }

    #[test]
    fn region_straddling_end_of_previous() {
        let mut ledger = ChunkLedger::new();
        ledger.record(b".snd", 0, 8);
        ledger.record(b"hdr", 8, 44);
        ledger.record(b"bad", 40, 50);
        let diags = ledger.validate(Some(50));
        assert_eq!(
            diags,
            vec![Diagnostic::Overlap {
                id: *b"bad ",
                start: 40,
                prev_end: 44
            }]
        );
    }

    #[test]
    fn nested_riff_layout() {
        let mut ledger = ChunkLedger::new();
        ledger.record(b"RIFF", 0, 64);
        ledger.record(b"fmt ", 12, 36);
        ledger.record(b"data", 36, 64);
        assert!(ledger.validate(Some(64)).is_empty());
        let text = ledger.render(Some(64));
        assert!(text.contains("RIFF: <0, 63>"), "{}", text);
        assert!(text.contains("  fmt : <12, 35>"), "{}", text);
    }

    #[test]
    fn gap_and_overlap_after_popping() {
        let mut ledger = ChunkLedger::new();
        ledger.record(b"RIFF", 0, 40);
        ledger.record(b"fmt ", 12, 20);
        ledger.record(b"data", 24, 48);
        ledger.record_to_eof(b"junk", 50);
        let diags = ledger.validate(Some(60));
        assert_eq!(
            diags,
            vec![
                Diagnostic::Overlap {
                    id: *b"data",
                    start: 24,
                    prev_end: 40
                },
                Diagnostic::Gap {
                    id: *b"junk",
                    from: 48,
                    to: 50
                },
            ]
        );
        assert_eq!(ledger.render(Some(60)).matches("warning").count(), 2);
    }

    #[test]
    fn overrun_and_trailing() {
        let mut ledger = ChunkLedger::new();
        ledger.record(b"FORM", 0, 70);
        assert_eq!(
            ledger.validate(Some(60)),
            vec![Diagnostic::Overrun {
                id: *b"FORM",
                end: 70,
                parent_end: 60
            }]
        );
        let mut ledger = ChunkLedger::new();
        ledger.record(b"FORM", 0, 50);
        assert_eq!(
            ledger.validate(Some(60)),
            vec![Diagnostic::Trailing { from: 50, to: 60 }]
        );
    }

    #[test]
    fn empty_region_ignored() {
        let mut ledger = ChunkLedger::new();
        ledger.record(b"none", 8, 8);
        assert!(ledger.is_empty());
    }
}
