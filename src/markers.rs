use crate::stylesheet::{Node, Stylesheet};

/// At-rule used to inject framework layers (`@tailwind utilities;`).
pub const INJECTION_DIRECTIVE: &str = "tailwind";

pub const COMPONENTS_START: &str = "tailwind start components";
pub const COMPONENTS_END: &str = "tailwind end components";
pub const UTILITIES_START: &str = "tailwind start utilities";
pub const UTILITIES_END: &str = "tailwind end utilities";

pub const REGION_MARKERS: [&str; 4] = [
    COMPONENTS_START,
    COMPONENTS_END,
    UTILITIES_START,
    UTILITIES_END,
];

pub const IGNORE_START: &str = "purgecss start ignore";
pub const IGNORE_END: &str = "purgecss end ignore";

/// Removes injection directives and region marker comments at every depth.
pub fn strip_markers(sheet: &mut Stylesheet) {
    sheet.retain_deep(|node| {
        if node.is_at_rule(INJECTION_DIRECTIVE) {
            return false;
        }
        !node
            .comment_text()
            .is_some_and(|text| REGION_MARKERS.contains(&text))
    });
}

/// Wraps the sheet in an ignore region and turns the utilities markers into
/// its boundaries, so only the utilities region is exposed to elimination.
/// Must run before [`strip_markers`].
pub fn annotate_conservative(sheet: &mut Stylesheet) {
    sheet.prepend(Node::comment(IGNORE_START));
    sheet.append(Node::comment(IGNORE_END));

    sheet.for_each_comment_mut(|text| {
        let replacement = match text.trim() {
            UTILITIES_START => IGNORE_END,
            UTILITIES_END => IGNORE_START,
            _ => return,
        };
        *text = replacement.to_string();
    });
}

#[cfg(test)]
mod tests {
    use super::{IGNORE_END, IGNORE_START, annotate_conservative, strip_markers};
    use crate::stylesheet::{Block, Node, Stylesheet};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn marked_sheet() -> Stylesheet {
        Stylesheet::parse(indoc! {"
            .base { margin: 0; }
            /* tailwind start components */
            .btn { padding: 1rem; }
            /* tailwind end components */
            /* tailwind start utilities */
            @tailwind utilities;
            .p-4 { padding: 1rem; }
            /* tailwind end utilities */
            /* keep me */
            .custom { color: red; }
        "})
        .expect("css should parse")
    }

    #[test]
    fn strips_markers_and_directives() {
        let mut sheet = marked_sheet();
        strip_markers(&mut sheet);
        let expected = vec![
            Node::rule(".base", "margin: 0;"),
            Node::rule(".btn", "padding: 1rem;"),
            Node::rule(".p-4", "padding: 1rem;"),
            Node::comment("keep me"),
            Node::rule(".custom", "color: red;"),
        ];
        assert_eq!(sheet.nodes, expected);

        strip_markers(&mut sheet);
        assert_eq!(sheet.nodes, expected);
    }

    #[test]
    fn strips_markers_inside_nested_blocks() {
        let mut sheet = Stylesheet::parse(
            "@media print { /* tailwind start utilities */ .a { color: red; } /*tailwind end utilities*/ }",
        )
        .expect("css should parse");
        strip_markers(&mut sheet);
        assert_eq!(
            sheet.to_css(),
            "@media print {\n  .a {\n    color: red;\n  }\n}\n"
        );
    }

    #[test]
    fn reaches_markers_in_blocks_holding_only_comments() {
        let mut sheet = Stylesheet::parse(indoc! {"
            @media print { /* tailwind start utilities */ }
            .p-4 { padding: 1rem; }
            @media print { /* tailwind end utilities */ }
        "})
        .expect("css should parse");
        annotate_conservative(&mut sheet);
        let mut comments = Vec::new();
        for node in &sheet.nodes {
            match node {
                Node::AtRule {
                    block: Some(Block::Nodes(children)),
                    ..
                } => comments.extend(children.iter().filter_map(Node::comment_text)),
                _ => comments.extend(node.comment_text()),
            }
        }
        assert_eq!(
            comments,
            vec![IGNORE_START, IGNORE_END, IGNORE_START, IGNORE_END]
        );

        let mut sheet = Stylesheet::parse("@media print { /* tailwind end utilities */ }")
            .expect("css should parse");
        strip_markers(&mut sheet);
        assert_eq!(sheet.to_css(), "@media print {\n}\n");
    }

    #[test]
    fn leaves_similar_comments_alone() {
        let mut sheet = Stylesheet::new(vec![
            Node::comment("tailwind start utilities please"),
            Node::at_rule("tailwindcss", ""),
        ]);
        let before = sheet.clone();
        strip_markers(&mut sheet);
        assert_eq!(sheet, before);
    }

    #[test]
    fn conservative_annotation_exposes_only_utilities() {
        let mut sheet = marked_sheet();
        annotate_conservative(&mut sheet);
        strip_markers(&mut sheet);
        assert_eq!(
            sheet.nodes,
            vec![
                Node::comment(IGNORE_START),
                Node::rule(".base", "margin: 0;"),
                Node::rule(".btn", "padding: 1rem;"),
                Node::comment(IGNORE_END),
                Node::rule(".p-4", "padding: 1rem;"),
                Node::comment(IGNORE_START),
                Node::comment("keep me"),
                Node::rule(".custom", "color: red;"),
                Node::comment(IGNORE_END),
            ]
        );
    }

    #[test]
    fn conservative_annotation_without_markers_ignores_everything() {
        let mut sheet = Stylesheet::new(vec![Node::rule(".a", "color: red;")]);
        annotate_conservative(&mut sheet);
        assert_eq!(
            sheet.nodes,
            vec![
                Node::comment(IGNORE_START),
                Node::rule(".a", "color: red;"),
                Node::comment(IGNORE_END),
            ]
        );
    }
}
