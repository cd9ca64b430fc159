//! Comment map: marker comments anchored to the node that follows them.
//!
//! syn discards plain `//` comments, so the map is built from the raw
//! source text. Consecutive comment lines form a block; a block whose
//! first line begins with the marker tags the node whose span starts on
//! the line after the block (or inside the block, when the marker is a
//! doc comment and therefore part of the node's own attributes).

/// The marker that tags a declaration or call for checking.
pub const MARKER: &str = "sqlboiler:check";

#[derive(Debug, Clone)]
struct MarkerBlock {
    /// 1-based line of the first comment line.
    start_line: usize,
    /// 1-based line of the last comment line.
    end_line: usize,
}

/// Per-file index of marker comment blocks.
#[derive(Debug, Clone, Default)]
pub struct CommentMap {
    blocks: Vec<MarkerBlock>,
}

impl CommentMap {
    pub fn new(source: &str) -> Self {
        let mut blocks = Vec::new();
        let mut current: Option<(usize, usize, bool)> = None; // start, end, is_marker

        for (idx, line) in source.lines().enumerate() {
            let lineno = idx + 1;
            match comment_text(line) {
                Some(text) => match current {
                    Some((start, _, is_marker)) => {
                        current = Some((start, lineno, is_marker));
                    }
                    None => {
                        current = Some((lineno, lineno, text.starts_with(MARKER)));
                    }
                },
                None => {
                    if let Some((start, end, true)) = current.take() {
                        blocks.push(MarkerBlock {
                            start_line: start,
                            end_line: end,
                        });
                    }
                }
            }
        }
        if let Some((start, end, true)) = current {
            blocks.push(MarkerBlock {
                start_line: start,
                end_line: end,
            });
        }

        Self { blocks }
    }

    /// The marker block tagging a node that starts at `line`, if any.
    pub fn marker_for_line(&self, line: usize) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.start_line <= line && line <= b.end_line + 1)
    }

    pub fn marker_line(&self, block: usize) -> usize {
        self.blocks[block].start_line
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// The text of a comment-only line with comment syntax and one leading
/// space stripped, or None for code lines.
fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = if let Some(rest) = trimmed.strip_prefix("///") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("//!") {
        rest
    } else {
        trimmed.strip_prefix("//")?
    };
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_attaches_to_next_line() {
        let src = "\
//sqlboiler:check
// extra explanation
const Q: &str = \"select 1\";
";
        let map = CommentMap::new(src);
        assert_eq!(map.len(), 1);
        assert_eq!(map.marker_for_line(3), Some(0));
        assert_eq!(map.marker_line(0), 1);
    }

    #[test]
    fn test_blank_line_breaks_attachment() {
        let src = "\
//sqlboiler:check

const Q: &str = \"select 1\";
";
        let map = CommentMap::new(src);
        assert_eq!(map.len(), 1);
        assert_eq!(map.marker_for_line(3), None);
    }

    #[test]
    fn test_marker_must_begin_block() {
        let src = "\
// explanation first
//sqlboiler:check
const Q: &str = \"select 1\";
";
        let map = CommentMap::new(src);
        assert!(map.is_empty());
    }

    #[test]
    fn test_doc_comment_marker_attaches_to_its_item() {
        // Doc comments are attributes, so the item's span starts on the
        // marker line itself.
        let src = "\
///sqlboiler:check
const Q: &str = \"select 1\";
";
        let map = CommentMap::new(src);
        assert_eq!(map.marker_for_line(1), Some(0));
        assert_eq!(map.marker_for_line(2), Some(0));
    }

    #[test]
    fn test_leading_space_is_stripped() {
        let map = CommentMap::new("// sqlboiler:check\nlet x = 1;\n");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_code_lines_with_slashes_are_not_comments() {
        let map = CommentMap::new("const URL: &str = \"http://x\"; //sqlboiler:check\n");
        // A trailing comment is not a comment-only line.
        assert!(map.is_empty());
    }
}
