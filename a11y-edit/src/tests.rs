#[cfg(test)]
mod engine_tests {
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::config::EditorConfig;
    use crate::engine::{EditRequest, LiveEditor};
    use crate::error::EditError;
    use crate::journal::{content_hash, EditJournal};
    use crate::location::ConstructionLocation;
    use crate::marker::AttributeKind;
    use crate::session::{Capability, ElementId, RuntimeComponent, Session, SessionContext};

    const SIGNUP_VIEW: &str = include_str!("../demos/signup_view.rs");
    const TYPE_NAME: &str = "app::views::signup::SignupView";

    const VIEW: ElementId = ElementId(1);
    const NAME: ElementId = ElementId(2);
    const EMAIL: ElementId = ElementId(3);
    const LOGO: ElementId = ElementId(4);
    const BUTTON: ElementId = ElementId(5);

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        session: Session,
        editor: LiveEditor,
    }

    impl Fixture {
        fn source(&self) -> String {
            fs::read_to_string(&self.path).unwrap()
        }

        fn line_of(&self, element: ElementId) -> usize {
            self.session.location_of(element).unwrap().line
        }
    }

    fn at(line: usize) -> Option<ConstructionLocation> {
        Some(ConstructionLocation::new("signup.rs", TYPE_NAME, line))
    }

    fn fixture(src: &str) -> Fixture {
        fixture_with(src, EditorConfig::default())
    }

    fn fixture_with(src: &str, config: EditorConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("src");
        let path = root.join("views").join("signup.rs");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, src).unwrap();

        let mut session = Session::new("s1", &root);
        session.register(RuntimeComponent::new(VIEW, "SignupView", []), at(11));
        session.register(RuntimeComponent::new(NAME, "ui::field::TextField", []), at(14));
        session.register(
            RuntimeComponent::new(EMAIL, "EmailField", [Capability::Label, Capability::Element]),
            at(17),
        );
        session.register(RuntimeComponent::new(LOGO, "Image", []), at(20));
        session.register(RuntimeComponent::new(BUTTON, "Button", []), at(23));
        session.set_current_view(VIEW);

        Fixture {
            _dir: dir,
            path,
            session,
            editor: LiveEditor::new(config),
        }
    }

    #[test]
    fn test_set_label_inserts_marked_call() {
        let mut fx = fixture(SIGNUP_VIEW);
        let report = fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();

        assert!(report.changed);
        assert_eq!(report.line_delta, 2);
        assert!(fx.source().contains(
            "        let name = TextField::new();\n        // <a11y-edit:label>\n        name.set_label(\"Full name\");\n        view.add(&name);\n"
        ));
    }

    #[test]
    fn test_set_label_twice_replaces() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor.set_label(&mut fx.session, NAME, "A").unwrap();
        let report = fx.editor.set_label(&mut fx.session, NAME, "B").unwrap();

        assert!(report.changed);
        assert_eq!(report.line_delta, 0);
        let source = fx.source();
        assert_eq!(source.matches("// <a11y-edit:label>").count(), 1);
        assert_eq!(source.matches("name.set_label(").count(), 1);
        assert!(source.contains("name.set_label(\"B\");"));
    }

    #[test]
    fn test_same_value_is_a_no_op() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();
        let before = fx.source();

        let report = fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();

        assert!(!report.changed);
        assert!(report.remap.is_identity());
        assert_eq!(fx.source(), before);
    }

    #[test]
    fn test_labels_on_different_receivers_are_independent() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();
        fx.editor.set_label(&mut fx.session, EMAIL, "Email").unwrap();

        let source = fx.source();
        assert_eq!(source.matches("// <a11y-edit:label>").count(), 2);
        assert!(source.contains("name.set_label(\"Full name\");"));
        assert!(source.contains("email.set_label(\"Email\");"));
    }

    #[test]
    fn test_locations_below_an_edit_move() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();

        assert_eq!(fx.line_of(VIEW), 11);
        assert_eq!(fx.line_of(NAME), 14);
        assert_eq!(fx.line_of(EMAIL), 19);
        assert_eq!(fx.line_of(LOGO), 22);
        assert_eq!(fx.line_of(BUTTON), 25);

        // the refreshed location still anchors on the right statement
        fx.editor
            .set_alt_text(&mut fx.session, LOGO, "Company logo")
            .unwrap();
        assert!(fx.source().contains(
            "        let logo = Image::new(\"logo.png\");\n        // <a11y-edit:alt-text>\n        logo.set_alt(\"Company logo\");\n"
        ));
        assert_eq!(fx.line_of(BUTTON), 27);
    }

    #[test]
    fn test_capability_gating_leaves_file_untouched() {
        let mut fx = fixture(SIGNUP_VIEW);

        let err = fx.editor.set_alt_text(&mut fx.session, NAME, "x").unwrap_err();
        match err {
            EditError::UnsupportedCapability {
                component,
                capability,
            } => {
                assert_eq!(component, "ui::field::TextField");
                assert_eq!(capability, Capability::ImageAlt);
            }
            other => panic!("unexpected error {:?}", other),
        }

        let err = fx.editor.set_label(&mut fx.session, BUTTON, "x").unwrap_err();
        assert!(matches!(err, EditError::UnsupportedCapability { .. }));
        assert_eq!(fx.source(), SIGNUP_VIEW);
    }

    #[test]
    fn test_unknown_and_untracked_elements() {
        let mut fx = fixture(SIGNUP_VIEW);

        let err = fx.editor.set_title(&mut fx.session, ElementId(99), "x").unwrap_err();
        assert!(matches!(err, EditError::ElementNotFound { .. }));

        fx.session
            .register(RuntimeComponent::new(ElementId(6), "TextField", []), None);
        let err = fx.editor.set_label(&mut fx.session, ElementId(6), "x").unwrap_err();
        assert!(matches!(err, EditError::NotTracked { .. }));
        assert_eq!(fx.source(), SIGNUP_VIEW);
    }

    #[test]
    fn test_stale_line_is_site_not_found() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.session
            .register(RuntimeComponent::new(NAME, "TextField", []), at(200));

        let err = fx.editor.set_label(&mut fx.session, NAME, "x").unwrap_err();
        assert!(matches!(err, EditError::SiteNotFound { line: 200, .. }));
        assert_eq!(fx.source(), SIGNUP_VIEW);
    }

    #[test]
    fn test_parse_error_leaves_file_and_locations() {
        let broken = SIGNUP_VIEW.replace("view\n    }", "view\n");
        let mut fx = fixture(&broken);

        let err = fx.editor.set_label(&mut fx.session, NAME, "x").unwrap_err();
        assert!(matches!(err, EditError::Parse { .. }));
        assert_eq!(fx.source(), broken);
        assert_eq!(fx.line_of(EMAIL), 17);
    }

    #[test]
    fn test_statement_without_binding_uses_view_receiver() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor
            .set_aria_label(&mut fx.session, BUTTON, "Create account")
            .unwrap();

        assert!(fx.source().contains(
            "        // <a11y-edit:aria-label>\n        view.set_aria_label(\"Create account\");\n        view.add(&Button::new(\"Sign up\"));\n"
        ));
        // inserted above the anchor: the anchor's own location moves
        assert_eq!(fx.line_of(BUTTON), 25);
    }

    #[test]
    fn test_unbound_statement_takes_over_first_marked_call() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor
            .set_aria_label(&mut fx.session, NAME, "Your name")
            .unwrap();
        fx.editor
            .set_aria_label(&mut fx.session, BUTTON, "Create account")
            .unwrap();

        let source = fx.source();
        assert_eq!(source.matches("// <a11y-edit:aria-label>").count(), 1);
        assert!(source.contains(
            "        let name = TextField::new();\n        // <a11y-edit:aria-label>\n        name.set_aria_label(\"Create account\");\n"
        ));
        assert!(!source.contains("view.set_aria_label"));
    }

    #[test]
    fn test_show_location_follows_edits() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor.set_label(&mut fx.session, NAME, "Name").unwrap();

        let site = fx.editor.show_location(&fx.session, EMAIL).unwrap();
        assert_eq!(site.path, fx.path);
        assert_eq!(site.line, 19);
        assert!(site.anchor.starts_with("let statement"));
        assert_eq!(site.receiver.as_deref(), Some("email"));

        let route = fx.editor.show_route(&fx.session).unwrap();
        assert_eq!(route.line, 11);
        assert!(route.anchor.starts_with("fn new"));
        assert_eq!(route.markers, vec![(AttributeKind::Label, 16)]);
        assert_eq!(fx.source().matches("a11y-edit:").count(), 1);
    }

    #[test]
    fn test_translated_label() {
        let mut config = EditorConfig::default();
        config.generation.translate = vec![AttributeKind::Label];
        let mut fx = fixture_with(SIGNUP_VIEW, config);

        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();
        assert!(fx.source().contains("name.set_label(tr(\"Full name\"));"));
    }

    #[test]
    fn test_escaped_value() {
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor
            .set_title(&mut fx.session, EMAIL, "Say \"hi\"\nthen go")
            .unwrap();
        assert!(fx
            .source()
            .contains(r#"email.set_title("Say \"hi\"\nthen go");"#));
    }

    #[test]
    fn test_page_title_added_then_replaced() {
        let mut fx = fixture(SIGNUP_VIEW);
        let report = fx.editor.set_page_title(&mut fx.session, "Sign up").unwrap();

        assert_eq!(report.line_delta, 2);
        assert!(fx.source().contains(
            "use ui::router::route;\nuse ui::router::page_title;\n\n#[route(\"signup\")]\n#[page_title(\"Sign up\")]\npub struct SignupView(VerticalLayout);\n"
        ));
        assert_eq!(fx.line_of(NAME), 16);

        let report = fx
            .editor
            .set_page_title(&mut fx.session, "Create account")
            .unwrap();
        assert_eq!(report.line_delta, 0);

        let source = fx.source();
        assert_eq!(source.matches("#[page_title(").count(), 1);
        assert_eq!(source.matches("use ui::router::page_title;").count(), 1);
        assert!(source.contains("#[page_title(\"Create account\")]\npub struct SignupView"));
    }

    #[test]
    fn test_page_title_without_current_view() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new("s2", dir.path());
        let editor = LiveEditor::new(EditorConfig::default());

        let err = editor.set_page_title(&mut session, "x").unwrap_err();
        assert!(matches!(err, EditError::ElementNotFound { .. }));
    }

    #[test]
    fn test_main_role_swaps_generic_container() {
        let mut fx = fixture(SIGNUP_VIEW);
        let report = fx.editor.promote_to_main_role(&mut fx.session).unwrap();

        assert!(report.changed);
        let source = fx.source();
        assert!(source.contains("use ui::router::route;\nuse ui::html::Main;\n"));
        assert!(source.contains("pub struct SignupView(Main);"));
        // only the declaration changes
        assert!(source.contains("let view = Self(VerticalLayout::new());"));

        let again = fx.editor.promote_to_main_role(&mut fx.session).unwrap();
        assert!(!again.changed);
        assert_eq!(fx.source(), source);
    }

    #[test]
    fn test_main_role_in_constructor() {
        let src = SIGNUP_VIEW.replace(
            "pub struct SignupView(VerticalLayout);",
            "pub struct SignupView(FormLayout);",
        );
        let mut fx = fixture(&src);
        fx.editor.promote_to_main_role(&mut fx.session).unwrap();

        let source = fx.source();
        assert!(source.contains(
            "        view.add(&Button::new(\"Sign up\"));\n        view.element().set_attribute(\"role\", \"main\");\n        view\n    }"
        ));

        let again = fx.editor.promote_to_main_role(&mut fx.session).unwrap();
        assert!(!again.changed);
        assert_eq!(source.matches("set_attribute(\"role\", \"main\")").count(), 1);
        assert_eq!(fx.source(), source);
    }

    #[test]
    fn test_bom_and_crlf_survive() {
        let src = format!("\u{feff}{}", SIGNUP_VIEW.replace('\n', "\r\n"));
        let mut fx = fixture(&src);
        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();

        let source = fx.source();
        assert!(source.starts_with('\u{feff}'));
        assert!(source.contains(
            "        // <a11y-edit:label>\r\n        name.set_label(\"Full name\");\r\n"
        ));
        assert!(!source.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_tagged_request() {
        let mut fx = fixture(SIGNUP_VIEW);
        let request: EditRequest =
            serde_json::from_str(r#"{"operation":"set-title","element":3,"text":"Email"}"#)
                .unwrap();
        assert_eq!(request.operation(), "set-title");

        fx.editor.apply(&mut fx.session, &request).unwrap();
        assert!(fx.source().contains("        // <a11y-edit:title>\n        email.set_title(\"Email\");\n"));
    }

    #[test]
    fn test_journal_records_applied_edits() {
        let state = TempDir::new().unwrap();
        let mut fx = fixture(SIGNUP_VIEW);
        fx.editor = LiveEditor::new(EditorConfig::default())
            .with_journal(EditJournal::open(state.path()));

        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();
        fx.editor.set_label(&mut fx.session, NAME, "Full name").unwrap();

        let history = fx.editor.journal().unwrap().history(10).unwrap();
        assert_eq!(history.len(), 1);
        let record = &history[0];
        assert_eq!(record.operation, "set-label");
        assert_eq!(record.session, fx.session.session_id().to_string());
        assert_eq!(record.line, 14);
        assert_eq!(record.hash_before, content_hash(SIGNUP_VIEW));
        assert_eq!(record.hash_after, content_hash(&fx.source()));
    }
}
