use super::*;
use crate::geometry;
use eframe::egui;

const SCREEN: egui::Vec2 = egui::vec2(1200.0, 800.0);

fn raw_input(events: Vec<egui::Event>, modifiers: egui::Modifiers) -> egui::RawInput {
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(egui::Rect::from_min_size(egui::Pos2::ZERO, SCREEN));
    raw.modifiers = modifiers;
    raw.events = events;
    raw
}

/// Run a single headless egui frame with the provided input events and closure.
///
/// The frame's held modifiers are taken from the first key event, so shortcuts
/// such as Cmd/Ctrl+Z see `modifiers.command`.
fn run_ui_with(events: Vec<egui::Event>, mut f: impl FnMut(&egui::Context)) -> egui::FullOutput {
    let modifiers = events
        .iter()
        .find_map(|e| match e {
            egui::Event::Key { modifiers, .. } => Some(*modifiers),
            _ => None,
        })
        .unwrap_or_default();
    let ctx = egui::Context::default();
    ctx.run(raw_input(events, modifiers), |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        f(ctx);
    })
}

/// Draws the canvas for one frame on a context that persists across frames.
fn canvas_frame(
    ctx: &egui::Context,
    app: &mut EditorApp,
    events: Vec<egui::Event>,
    modifiers: egui::Modifiers,
) -> egui::FullOutput {
    ctx.run(raw_input(events, modifiers), |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    })
}

fn press(pos: egui::Pos2, button: egui::PointerButton) -> egui::Event {
    egui::Event::PointerButton {
        pos,
        button,
        pressed: true,
        modifiers: egui::Modifiers::NONE,
    }
}

fn release(pos: egui::Pos2, button: egui::PointerButton) -> egui::Event {
    egui::Event::PointerButton {
        pos,
        button,
        pressed: false,
        modifiers: egui::Modifiers::NONE,
    }
}

fn key(key: egui::Key, modifiers: egui::Modifiers) -> egui::Event {
    egui::Event::Key {
        key,
        physical_key: None,
        pressed: true,
        repeat: false,
        modifiers,
    }
}

/// App with the given nodes loaded as a fresh document, where screen == world.
fn app_with_nodes(nodes: &[(&str, (f32, f32))]) -> EditorApp {
    let mut diagram = Diagram::new();
    for (id, pos) in nodes {
        diagram
            .insert_node(DiagramNode::new(*id, NodeShape::Rectangle, *pos))
            .unwrap();
    }
    let mut app = EditorApp::default();
    app.core.load_diagram(diagram);
    app.canvas.centered = true;
    app.canvas.offset = egui::Vec2::ZERO;
    app.canvas.zoom_factor = 1.0;
    app
}

fn node_pos(app: &EditorApp, id: &str) -> (f32, f32) {
    app.core.diagram().node(id).unwrap().position
}

#[test]
fn clicking_canvas_selects_node() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0)), ("b", (500.0, 150.0))]);
    let click_pos = egui::pos2(200.0, 150.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(click_pos)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(click_pos, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );

    assert_eq!(app.core.selected_nodes(), ["a".to_string()]);
}

#[test]
fn shift_click_adds_node_to_selection() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0)), ("b", (500.0, 150.0))]);
    app.core.select_node("a");
    let b = egui::pos2(500.0, 150.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(b)], egui::Modifiers::SHIFT);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(b, egui::PointerButton::Primary)],
        egui::Modifiers::SHIFT,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![release(b, egui::PointerButton::Primary)],
        egui::Modifiers::SHIFT,
    );

    assert_eq!(app.core.selected_nodes().len(), 2);
    assert!(app.core.selection().contains_node("a"));
    assert!(app.core.selection().contains_node("b"));
    assert!(app.core.diagram().connections.is_empty());
}

#[test]
fn shift_drag_creates_connection_between_nodes() {
    let mut app = app_with_nodes(&[("a", (160.0, 120.0)), ("b", (460.0, 120.0))]);
    app.new_link_kind = LinkKind::Dotted;
    let start = egui::pos2(160.0, 120.0);
    let end = egui::pos2(460.0, 120.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::SHIFT,
    );
    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(end)], egui::Modifiers::SHIFT);
    assert_eq!(app.interaction.drawing_connection_from.as_deref(), Some("a"));

    canvas_frame(
        &ctx,
        &mut app,
        vec![release(end, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );

    let connections = &app.core.diagram().connections;
    assert_eq!(connections.len(), 1, "one connection expected");
    assert_eq!(connections[0].from, "a");
    assert_eq!(connections[0].to, "b");
    assert_eq!(connections[0].kind, LinkKind::Dotted);
    assert_eq!(app.core.selected_connection(), Some(connections[0].id));
    assert!(app.interaction.drawing_connection_from.is_none());
}

#[test]
fn connection_onto_same_node_is_rejected_with_status() {
    let mut app = app_with_nodes(&[("a", (200.0, 200.0))]);
    let start = egui::pos2(200.0, 200.0);
    let away = egui::pos2(200.0, 400.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::SHIFT,
    );
    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(away)], egui::Modifiers::SHIFT);
    assert!(app.connection_target_valid("a", egui::pos2(200.0, 400.0)));
    assert!(!app.connection_target_valid("a", start));

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::SHIFT);
    canvas_frame(
        &ctx,
        &mut app,
        vec![release(start, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );

    assert!(app.core.diagram().connections.is_empty());
    assert!(app.status.is_some(), "rejection should be reported");
}

#[test]
fn duplicate_connection_target_is_invalid_for_same_kind_only() {
    let mut app = app_with_nodes(&[("a", (200.0, 200.0)), ("b", (500.0, 200.0))]);
    app.core.connect("a", "b", LinkKind::Arrow).unwrap();
    let b = egui::pos2(500.0, 200.0);

    app.new_link_kind = LinkKind::Arrow;
    assert!(!app.connection_target_valid("a", b));
    app.new_link_kind = LinkKind::Thick;
    assert!(app.connection_target_valid("a", b));
}

#[test]
fn marquee_selects_nodes_inside_rectangle() {
    let mut app = app_with_nodes(&[
        ("a", (200.0, 150.0)),
        ("b", (350.0, 150.0)),
        ("c", (800.0, 600.0)),
    ]);
    let start = egui::pos2(100.0, 80.0);
    let end = egui::pos2(420.0, 220.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );
    assert!(app.interaction.marquee_start.is_some(), "press on empty space starts a marquee");

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(end)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![release(end, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );

    let mut selected = app.core.selected_nodes().to_vec();
    selected.sort();
    assert_eq!(selected, ["a".to_string(), "b".to_string()]);
    assert!(app.interaction.marquee_start.is_none());
}

#[test]
fn shift_marquee_extends_selection() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0)), ("c", (800.0, 600.0))]);
    app.core.select_node("c");
    let start = egui::pos2(100.0, 80.0);
    let end = egui::pos2(300.0, 220.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::SHIFT);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::SHIFT,
    );
    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(end)], egui::Modifiers::SHIFT);
    canvas_frame(
        &ctx,
        &mut app,
        vec![release(end, egui::PointerButton::Primary)],
        egui::Modifiers::SHIFT,
    );

    assert!(app.core.selection().contains_node("a"));
    assert!(app.core.selection().contains_node("c"));
}

#[test]
fn drag_moves_selection_and_single_undo_restores() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0)), ("b", (500.0, 150.0))]);
    app.core.select_nodes(["a".to_string(), "b".to_string()]);
    let start = egui::pos2(200.0, 150.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![egui::Event::PointerMoved(egui::pos2(225.0, 165.0))],
        egui::Modifiers::NONE,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![egui::Event::PointerMoved(egui::pos2(250.0, 180.0))],
        egui::Modifiers::NONE,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![release(egui::pos2(250.0, 180.0), egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );

    assert_eq!(node_pos(&app, "a"), (250.0, 180.0));
    assert_eq!(node_pos(&app, "b"), (550.0, 180.0));
    assert!(!app.core.is_moving());
    assert!(app.core.sync().text().contains("250"), "layout comment follows the drag");

    assert_eq!(app.core.undo().as_deref(), Some("Move nodes"));
    assert_eq!(node_pos(&app, "a"), (200.0, 150.0));
    assert_eq!(node_pos(&app, "b"), (500.0, 150.0));
    assert!(!app.core.history().can_undo(), "the whole drag is one step");
}

#[test]
fn snapping_drag_lands_on_grid() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0))]);
    app.config.snap_to_grid = true;
    app.config.grid_size = 20.0;
    let start = egui::pos2(200.0, 150.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![egui::Event::PointerMoved(egui::pos2(233.0, 187.0))],
        egui::Modifiers::NONE,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![release(egui::pos2(233.0, 187.0), egui::PointerButton::Primary)],
        egui::Modifiers::NONE,
    );

    assert_eq!(node_pos(&app, "a"), (240.0, 180.0));
}

#[test]
fn click_near_connection_selects_it() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0)), ("b", (200.0, 450.0))]);
    let conn_id = app.core.connect("a", "b", LinkKind::Arrow).unwrap();
    app.core.clear_selection();

    let diagram = app.core.diagram();
    let connection = diagram.connection(conn_id).unwrap();
    let mid = geometry::connection_path_for(diagram, connection).unwrap().midpoint();
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(mid)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![
            press(mid, egui::PointerButton::Primary),
            release(mid, egui::PointerButton::Primary),
        ],
        egui::Modifiers::NONE,
    );

    assert_eq!(app.core.selected_connection(), Some(conn_id));
    assert!(app.core.selected_nodes().is_empty());
}

#[test]
fn click_empty_space_clears_selection() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0))]);
    app.core.select_node("a");
    let empty = egui::pos2(700.0, 500.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(empty)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![
            press(empty, egui::PointerButton::Primary),
            release(empty, egui::PointerButton::Primary),
        ],
        egui::Modifiers::NONE,
    );

    assert!(app.core.selection().is_empty());
}

#[test]
fn command_primary_drag_pans_canvas_without_marquee() {
    let mut app = app_with_nodes(&[]);
    let start = egui::pos2(400.0, 300.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(start)], egui::Modifiers::COMMAND);
    canvas_frame(
        &ctx,
        &mut app,
        vec![press(start, egui::PointerButton::Primary)],
        egui::Modifiers::COMMAND,
    );
    canvas_frame(
        &ctx,
        &mut app,
        vec![egui::Event::PointerMoved(egui::pos2(440.0, 330.0))],
        egui::Modifiers::COMMAND,
    );

    assert_eq!(app.canvas.offset, egui::vec2(40.0, 30.0));
    assert!(app.interaction.marquee_start.is_none());
}

#[test]
fn double_click_opens_label_editor() {
    let mut app = app_with_nodes(&[("a", (300.0, 200.0))]);
    let pos = egui::pos2(300.0, 200.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(pos)], egui::Modifiers::NONE);
    for _ in 0..2 {
        canvas_frame(
            &ctx,
            &mut app,
            vec![press(pos, egui::PointerButton::Primary)],
            egui::Modifiers::NONE,
        );
        canvas_frame(
            &ctx,
            &mut app,
            vec![release(pos, egui::PointerButton::Primary)],
            egui::Modifiers::NONE,
        );
    }

    assert_eq!(app.interaction.editing_label.as_deref(), Some("a"));
    assert_eq!(app.interaction.temp_label, "a");
    assert_eq!(node_pos(&app, "a"), (300.0, 200.0));
}

#[test]
fn label_editor_enter_applies_label() {
    let mut app = app_with_nodes(&[("a", (300.0, 200.0))]);
    app.start_editing_label("a");
    let ctx = egui::Context::default();

    // Focus is requested on the first frame and granted on the next
    canvas_frame(&ctx, &mut app, vec![], egui::Modifiers::NONE);
    canvas_frame(&ctx, &mut app, vec![], egui::Modifiers::NONE);

    app.interaction.temp_label = "Check input".to_string();
    canvas_frame(
        &ctx,
        &mut app,
        vec![key(egui::Key::Enter, egui::Modifiers::NONE)],
        egui::Modifiers::NONE,
    );
    canvas_frame(&ctx, &mut app, vec![], egui::Modifiers::NONE);

    assert!(app.interaction.editing_label.is_none());
    assert_eq!(app.core.diagram().node("a").unwrap().label, "Check input");
    assert_eq!(app.core.undo().as_deref(), Some("Edit label"));
}

#[test]
fn label_editor_escape_cancels() {
    let mut app = app_with_nodes(&[("a", (300.0, 200.0))]);
    app.start_editing_label("a");
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![], egui::Modifiers::NONE);
    app.interaction.temp_label = "Discarded".to_string();
    canvas_frame(
        &ctx,
        &mut app,
        vec![key(egui::Key::Escape, egui::Modifiers::NONE)],
        egui::Modifiers::NONE,
    );

    assert!(app.interaction.editing_label.is_none());
    assert_eq!(app.core.diagram().node("a").unwrap().label, "a");
    assert!(!app.core.history().can_undo());
}

#[test]
fn context_menu_open_and_click_outside_closes() {
    let mut app = app_with_nodes(&[]);
    let open_at = egui::pos2(500.0, 400.0);
    let outside = egui::pos2(50.0, 50.0);
    let ctx = egui::Context::default();

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(open_at)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![
            press(open_at, egui::PointerButton::Secondary),
            release(open_at, egui::PointerButton::Secondary),
        ],
        egui::Modifiers::NONE,
    );

    assert!(app.context_menu.show, "context menu should be shown after right-click");
    assert_eq!(app.context_menu.world_pos, (500.0, 400.0));
    // draw_context_menu() clears just_opened at the end of the opening frame
    assert!(!app.context_menu.just_opened);

    canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(outside)], egui::Modifiers::NONE);
    canvas_frame(
        &ctx,
        &mut app,
        vec![
            press(outside, egui::PointerButton::Primary),
            release(outside, egui::PointerButton::Primary),
        ],
        egui::Modifiers::NONE,
    );

    assert!(!app.context_menu.show, "menu should close when clicking outside area");
}

#[test]
fn create_node_at_selects_and_starts_label_edit() {
    let mut app = app_with_nodes(&[]);
    app.config.snap_to_grid = true;

    let id = app.create_node_at(NodeShape::Diamond, egui::pos2(107.0, 93.0));

    let node = app.core.diagram().node(&id).unwrap();
    assert_eq!(node.shape, NodeShape::Diamond);
    assert_eq!(node.position, (100.0, 100.0));
    assert_eq!(app.core.selected_nodes(), [id.clone()]);
    assert_eq!(app.interaction.editing_label.as_ref(), Some(&id));
    assert!(app.core.sync().text().contains(&format!("{id}{{{id}}}")));

    app.perform_undo();
    assert!(app.core.diagram().is_empty());
    assert!(app.interaction.editing_label.is_none());
}

#[test]
fn zoom_around_keeps_anchor_and_clamps() {
    let mut app = app_with_nodes(&[]);
    let anchor = egui::pos2(300.0, 200.0);
    let world_before = app.screen_to_world(anchor);

    app.zoom_around(anchor, 2.0);
    assert_eq!(app.canvas.zoom_factor, 2.0);
    let world_after = app.screen_to_world(anchor);
    assert!((world_before - world_after).length() < 1e-3);

    app.zoom_around(anchor, 100.0);
    assert_eq!(app.canvas.zoom_factor, crate::constants::MAX_ZOOM);
    app.zoom_around(anchor, 0.0);
    assert_eq!(app.canvas.zoom_factor, crate::constants::MIN_ZOOM);
}

#[test]
fn center_view_puts_diagram_in_middle_of_canvas() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (400.0, 200.0))]);
    let rect = egui::Rect::from_min_size(egui::pos2(100.0, 50.0), egui::vec2(800.0, 600.0));

    app.center_view(rect);

    let center = app.world_to_screen(egui::pos2(200.0, 100.0));
    assert!((center - rect.center()).length() < 1e-3);
    assert!(app.canvas.centered);
}

#[test]
fn delete_key_removes_selected_node_and_links() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (0.0, 200.0))]);
    app.core.connect("a", "b", LinkKind::Arrow).unwrap();
    app.core.select_node("a");

    run_ui_with(vec![key(egui::Key::Delete, egui::Modifiers::NONE)], |ctx| {
        app.handle_delete_key(ctx);
    });

    assert!(app.core.diagram().node("a").is_none());
    assert!(app.core.diagram().connections.is_empty());
    assert!(app.core.selection().is_empty());
}

#[test]
fn delete_key_is_ignored_while_editing_label() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0))]);
    app.start_editing_label("a");

    run_ui_with(vec![key(egui::Key::Backspace, egui::Modifiers::NONE)], |ctx| {
        app.handle_delete_key(ctx);
    });

    assert!(app.core.diagram().node("a").is_some());
}

#[test]
fn undo_redo_shortcuts_step_through_history() {
    let mut app = app_with_nodes(&[]);
    app.core.create_node(NodeShape::Rectangle, (0.0, 0.0));

    run_ui_with(vec![key(egui::Key::Z, egui::Modifiers::COMMAND)], |ctx| {
        app.handle_undo_redo_keys(ctx);
    });
    assert!(app.core.diagram().is_empty());
    assert_eq!(app.status.as_deref(), Some("Undid Create node"));

    run_ui_with(vec![key(egui::Key::Y, egui::Modifiers::COMMAND)], |ctx| {
        app.handle_undo_redo_keys(ctx);
    });
    assert_eq!(app.core.diagram().nodes.len(), 1);
}

#[test]
fn editing_shortcuts_wait_for_drag_to_finish() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (0.0, 200.0))]);
    app.core.create_node(NodeShape::Rectangle, (300.0, 0.0));
    app.core.select_node("a");
    app.core.begin_move();
    app.core.move_selection_by(40.0, 0.0);

    run_ui_with(vec![key(egui::Key::Z, egui::Modifiers::COMMAND)], |ctx| {
        app.handle_undo_redo_keys(ctx);
    });
    run_ui_with(vec![key(egui::Key::Delete, egui::Modifiers::NONE)], |ctx| {
        app.handle_delete_key(ctx);
    });

    assert!(app.core.is_moving());
    assert_eq!(app.core.diagram().nodes.len(), 3);
    app.core.end_move();
    assert_eq!(app.core.undo().as_deref(), Some("Move nodes"));
    assert_eq!(app.core.undo().as_deref(), Some("Create node"));
}

#[test]
fn select_all_and_duplicate_shortcuts() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (0.0, 200.0))]);

    run_ui_with(vec![key(egui::Key::A, egui::Modifiers::COMMAND)], |ctx| {
        app.handle_edit_shortcuts(ctx);
    });
    assert_eq!(app.core.selected_nodes().len(), 2);

    run_ui_with(vec![key(egui::Key::D, egui::Modifiers::COMMAND)], |ctx| {
        app.handle_edit_shortcuts(ctx);
    });
    assert_eq!(app.core.diagram().nodes.len(), 4);
    assert!(!app.core.selection().contains_node("a"), "copies are selected");
}

#[test]
fn property_edits_apply_to_the_node_they_were_loaded_from() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (0.0, 200.0))]);
    app.core.select_node("a");
    let ctx = egui::Context::default();
    let draw = |app: &mut EditorApp| {
        let _ = ctx.run(raw_input(vec![], egui::Modifiers::NONE), |ctx| {
            egui::SidePanel::right("properties_panel").show(ctx, |ui| app.draw_properties_panel(ui));
        });
    };

    draw(&mut app);
    assert_eq!(app.interaction.props_node.as_deref(), Some("a"));
    assert_eq!(app.interaction.temp_props_label, "a");

    // Typing into the label field, then clicking another node
    app.interaction.temp_props_label = "Start".to_string();
    app.interaction.props_node_dirty = true;
    app.core.select_node("b");
    draw(&mut app);

    assert_eq!(app.core.diagram().node("a").unwrap().label, "Start");
    assert_eq!(app.core.diagram().node("b").unwrap().label, "b");
    assert_eq!(app.interaction.props_node.as_deref(), Some("b"));
}

#[test]
fn property_rename_follows_node_and_reports_conflicts() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (0.0, 200.0))]);
    app.core.select_node("a");

    app.interaction.props_node = Some("a".to_string());
    app.interaction.temp_node_id = "start".to_string();
    app.interaction.temp_props_label = "a".to_string();
    app.interaction.props_node_dirty = true;
    app.flush_property_edits();

    assert!(app.core.diagram().node("start").is_some());
    assert!(app.core.selection().contains_node("start"));

    app.interaction.temp_node_id = "b".to_string();
    app.interaction.props_node_dirty = true;
    app.flush_property_edits();
    assert!(app.core.diagram().node("start").is_some());
    assert!(app.status.as_deref().is_some_and(|s| s.contains("already exists")));
}

#[test]
fn empty_link_label_buffer_clears_label() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0)), ("b", (0.0, 200.0))]);
    let id = app.core.connect("a", "b", LinkKind::Arrow).unwrap();
    app.core.set_connection_label(id, Some("yes")).unwrap();

    app.interaction.props_connection = Some(id);
    app.interaction.temp_connection_label = "   ".to_string();
    app.interaction.props_connection_dirty = true;
    app.flush_property_edits();

    assert_eq!(app.core.diagram().connection(id).unwrap().label, None);
}

#[test]
fn code_panel_edit_reaches_canvas_after_debounce() {
    let mut app = app_with_nodes(&[]);
    app.config.debounce_secs = 0.5;
    app.apply_config();

    app.core.text_edited("flowchart LR\n    a[Start] --> b{Done?}\n".to_string(), 10.0);
    let _ = run_ui_with(vec![], |ctx| {
        egui::SidePanel::right("code_panel").show(ctx, |ui| app.draw_code_panel(ui));
    });

    assert!(!app.core.tick(10.2), "still typing");
    assert!(app.core.diagram().is_empty());
    assert!(app.core.tick(10.6));
    assert_eq!(app.core.diagram().direction, Direction::LeftRight);
    assert_eq!(app.core.diagram().node("b").unwrap().shape, NodeShape::Diamond);
}

#[test]
fn invalid_code_leaves_canvas_unchanged() {
    let mut app = app_with_nodes(&[("a", (0.0, 0.0))]);
    let before = app.core.diagram().clone();

    app.core.text_edited("flowchart TD\n    a[unclosed --> b\n".to_string(), 0.0);
    assert!(!app.core.tick(5.0));

    assert_eq!(app.core.diagram(), &before);
    assert_eq!(app.core.sync().status(), SyncStatus::Invalid);
    let _ = run_ui_with(vec![], |ctx| {
        egui::SidePanel::right("code_panel").show(ctx, |ui| app.draw_code_panel(ui));
    });
}

#[test]
fn drawing_canvas_with_nodes_produces_shapes() {
    let mut app = app_with_nodes(&[("a", (200.0, 150.0)), ("b", (200.0, 400.0))]);
    let id = app.core.connect("a", "b", LinkKind::Thick).unwrap();
    app.core.set_connection_label(id, Some("go")).unwrap();
    app.core.select_node("a");

    let output = run_ui_with(vec![], |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });

    assert!(!output.shapes.is_empty());
}

#[test]
fn first_frame_centres_loaded_diagram() {
    let mut app = app_with_nodes(&[("a", (1000.0, 1000.0))]);
    app.canvas.centered = false;

    let _ = run_ui_with(vec![], |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| app.draw_canvas(ui));
    });

    assert!(app.canvas.centered);
    let node_screen = app.world_to_screen(egui::pos2(1000.0, 1000.0));
    assert!(app.canvas.viewport.contains(node_screen));
}

#[test]
fn unsaved_dialog_confirm_runs_pending_action() {
    let mut app = app_with_nodes(&[]);
    app.core.create_node(NodeShape::Rectangle, (0.0, 0.0));
    let ctx = egui::Context::default();
    app.request_action(&ctx, PendingConfirmAction::New);
    assert!(app.file.show_unsaved_dialog);

    let pending = app.file.pending_confirm_action.take();
    app.file.show_unsaved_dialog = false;
    if let Some(action) = pending {
        app.perform_action(&ctx, action);
    }

    assert!(app.core.diagram().is_empty());
    assert!(!app.core.is_dirty());
    assert!(!app.core.history().can_undo());
}
