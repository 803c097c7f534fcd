//! FILENAME: core/lineup-engine/src/column/flatten.rs
//! Horizontal layout of a ranking's column tree.

use serde::Serialize;

use super::{ColumnId, ColumnTree};

/// One visible column with its horizontal placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatColumn {
    pub id: ColumnId,
    /// 0 for top-level columns.
    pub depth: usize,
    pub offset: f64,
    pub width: f64,
}

/// Depth-first walk over `top_level`. Expanded composites emit themselves
/// and then their children, laid out from the parent's offset.
pub fn flatten(tree: &ColumnTree, top_level: &[ColumnId], padding: f64) -> Vec<FlatColumn> {
    let mut out = Vec::with_capacity(tree.len());
    let mut offset = 0.0;
    for id in top_level {
        walk(tree, *id, 0, offset, padding, &mut out);
        offset += tree.column(*id).width + padding;
    }
    out
}

fn walk(tree: &ColumnTree, id: ColumnId, depth: usize, offset: f64, padding: f64, out: &mut Vec<FlatColumn>) {
    let column = tree.column(id);
    out.push(FlatColumn {
        id,
        depth,
        offset,
        width: column.width,
    });
    if column.kind.is_collapsed() {
        return;
    }
    let mut child_offset = offset;
    for child in column.kind.children() {
        walk(tree, *child, depth + 1, child_offset, padding, out);
        child_offset += tree.column(*child).width + padding;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ColumnDesc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flatten_layout() {
        let mut tree = ColumnTree::new(0);
        let name = tree
            .build(&ColumnDesc::string("name").with_width(50.0), None)
            .unwrap();
        let stack = tree
            .build(
                &ColumnDesc::stack(
                    vec![
                        ColumnDesc::number("a").with_width(40.0),
                        ColumnDesc::number("b").with_width(60.0),
                    ],
                    vec![1.0, 1.0],
                )
                .with_width(100.0),
                None,
            )
            .unwrap();
        let children = tree.children(stack).to_vec();

        let flat = flatten(&tree, &[name, stack], 5.0);

        let placed: Vec<(ColumnId, usize, f64)> = flat.iter().map(|f| (f.id, f.depth, f.offset)).collect();
        assert_eq!(
            placed,
            vec![
                (name, 0, 0.0),
                (stack, 0, 55.0),
                (children[0], 1, 55.0),
                (children[1], 1, 100.0),
            ]
        );
    }

    #[test]
    fn test_collapsed_hides_children() {
        let mut tree = ColumnTree::new(0);
        let mut desc = ColumnDesc::nested(vec![ColumnDesc::string("a"), ColumnDesc::string("b")]);
        desc.collapsed = Some(true);
        let nested = tree.build(&desc, None).unwrap();
        assert_eq!(flatten(&tree, &[nested], 5.0).len(), 1);
    }
}
