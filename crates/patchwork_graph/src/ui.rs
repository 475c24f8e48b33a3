// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drawing for the patchbay.
//!
//! [`Patchbay::draw`] does not touch the session; it produces a
//! [`DrawList`] in root space that a host paints with an egui [`Painter`].

use crate::graph::Patchbay;
use crate::interaction::Focus;
use crate::picking::Target;
use crate::port::PortDirection;
use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke, Vec2};

/// Default font size for labels
const LABEL_FONT_SIZE: f32 = 11.0;

/// Extra margin between the label box and its outline
const OUTLINE_MARGIN: f32 = 2.0;

/// Where the status line is drawn
const STATUS_POS: Pos2 = Pos2::new(4.0, 4.0);

/// One primitive of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Rectangle, optionally filled
    Rect {
        /// Rectangle in root space
        rect: Rect,
        /// Fill color, `None` for an outline only
        fill: Option<Color32>,
        /// Outline stroke
        stroke: Stroke,
    },
    /// Straight line
    Line {
        /// End points in root space
        points: [Pos2; 2],
        /// Line stroke
        stroke: Stroke,
    },
    /// Text anchored at its top-left corner
    Text {
        /// Anchor in root space
        pos: Pos2,
        /// Text to draw
        text: String,
        /// Font size
        size: f32,
        /// Text color
        color: Color32,
    },
}

/// Primitives of one frame, in paint order
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    /// Append a command
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Commands in paint order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is drawn
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Paint every command, offset by the painter's clip origin
    pub fn paint(&self, painter: &Painter) {
        let origin = painter.clip_rect().min.to_vec2();
        for command in &self.commands {
            match command {
                DrawCommand::Rect { rect, fill, stroke } => {
                    let rect = rect.translate(origin);
                    if let Some(fill) = fill {
                        painter.rect_filled(rect, 0.0, *fill);
                    }
                    if stroke.width > 0.0 {
                        painter.rect_stroke(rect, 0.0, *stroke);
                    }
                }
                DrawCommand::Line { points, stroke } => {
                    painter.line_segment([points[0] + origin, points[1] + origin], *stroke);
                }
                DrawCommand::Text {
                    pos,
                    text,
                    size,
                    color,
                } => {
                    painter.text(
                        *pos + origin,
                        Align2::LEFT_TOP,
                        text,
                        FontId::monospace(*size),
                        *color,
                    );
                }
            }
        }
    }
}

impl Patchbay {
    /// Build the display list for the current frame: cords, then every
    /// patcher in scene order, then the status line.
    pub fn draw(&self) -> DrawList {
        let config = &self.config;
        let mut list = DrawList::default();
        let hover = self.interaction.hover;
        let focus = self.interaction.focus;

        for (id, cord) in &self.cords {
            let (Some(from), Some(to)) = (
                self.port_position(cord.upstream()),
                self.port_position(cord.downstream()),
            ) else {
                continue;
            };
            let color = if focus == Some(Focus::Cord(id)) {
                config.focus()
            } else {
                config.cord()
            };
            let width = if hover == Some(Target::Cord(id)) { 2.0 } else { 1.0 };
            list.push(DrawCommand::Line {
                points: [from, to],
                stroke: Stroke::new(width, color),
            });
        }

        for scene in self.scene.walk(self.scene.root()) {
            let Some(node) = self.scene.get(scene).and_then(|s| s.patcher()) else {
                continue;
            };
            let Some(patcher) = self.patchers.get(node) else {
                continue;
            };
            let offset = self.scene.local_to_global(scene, Pos2::ZERO).to_vec2();
            let body = patcher.content_rect().translate(offset);

            list.push(DrawCommand::Rect {
                rect: body,
                fill: None,
                stroke: Stroke::new(1.0, config.chrome()),
            });
            list.push(DrawCommand::Text {
                pos: body.min + Vec2::splat(config.text_padding),
                text: patcher.text().to_string(),
                size: LABEL_FONT_SIZE,
                color: config.text(),
            });

            let hovered = hover.and_then(|t| t.node()) == Some(node);
            let focused = focus == Some(Focus::Patcher(node));
            if hovered || focused {
                let color = if focused { config.focus() } else { config.chrome() };
                let width = if hovered { 2.0 } else { 1.0 };
                list.push(DrawCommand::Rect {
                    rect: body.expand(OUTLINE_MARGIN),
                    fill: None,
                    stroke: Stroke::new(width, color),
                });
            }

            for port in patcher.ports() {
                let rect = port.rect().translate(offset);
                if hover == Some(Target::Port(port.id(node))) {
                    let lift = match port.direction() {
                        PortDirection::Input => -1.0,
                        PortDirection::Output => 0.0,
                    };
                    let marker = Vec2::from(config.hover_marker);
                    list.push(DrawCommand::Rect {
                        rect: Rect::from_center_size(rect.center() + Vec2::new(0.0, lift), marker),
                        fill: Some(config.focus()),
                        stroke: Stroke::NONE,
                    });
                }
                list.push(DrawCommand::Rect {
                    rect,
                    fill: Some(config.chrome()),
                    stroke: Stroke::NONE,
                });
            }

            if let Some(from) = self
                .interaction
                .patching
                .filter(|p| p.node == node)
                .and_then(|p| self.port_position(p))
            {
                list.push(DrawCommand::Line {
                    points: [from, self.interaction.cursor],
                    stroke: Stroke::new(1.0, config.focus()),
                });
            }
        }

        if let Some(status) = &self.status {
            list.push(DrawCommand::Text {
                pos: STATUS_POS,
                text: status.clone(),
                size: LABEL_FONT_SIZE,
                color: config.text(),
            });
        }

        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Constant, Print, Vec3};
    use crate::port::PortId;
    use egui::PointerButton;

    fn texts(list: &DrawList) -> Vec<&str> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_draw_empty_patchbay() {
        assert!(Patchbay::default().draw().is_empty());
    }

    #[test]
    fn test_draw_patchers_and_cords() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let b = bay.spawn(Print::<Vec3>::new());
        bay.set_position(b, Pos2::new(0.0, 100.0)).unwrap();
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();

        let list = bay.draw();
        // Cords come first
        assert!(matches!(list.commands()[0], DrawCommand::Line { .. }));
        assert_eq!(texts(&list), vec!["Constant", "(0.00, 0.00, 0.00)"]);
        // Two bodies, two labels, two ports, one cord
        assert_eq!(list.len(), 7);
    }

    #[test]
    fn test_focus_and_hover_outline() {
        let config = crate::config::PatchbayConfig::default();
        let mut bay = Patchbay::default();
        bay.spawn(Constant::new(Vec3::ZERO));
        bay.mouse_pressed(Pos2::new(5.0, 5.0), PointerButton::Primary);

        let list = bay.draw();
        let outline = list.commands().iter().find_map(|c| match c {
            DrawCommand::Rect { stroke, fill: None, rect } if stroke.color == config.focus() => {
                Some((*rect, stroke.width))
            }
            _ => None,
        });
        let (rect, width) = outline.unwrap();
        assert_eq!(width, 2.0);
        assert_eq!(rect.min, Pos2::new(-OUTLINE_MARGIN, -OUTLINE_MARGIN));
    }

    #[test]
    fn test_hover_marker_and_rubber_band() {
        let config = crate::config::PatchbayConfig::default();
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let out = bay.port_position(PortId::output(a, 0)).unwrap();
        bay.mouse_pressed(out, PointerButton::Primary);
        bay.mouse_dragged(Pos2::new(300.0, 300.0), PointerButton::Primary);
        bay.mouse_moved(out);

        let list = bay.draw();
        assert!(list.commands().iter().any(|c| matches!(
            c,
            DrawCommand::Rect { rect, fill: Some(_), .. }
                if rect.size() == Vec2::from(config.hover_marker)
        )));
        assert!(list.commands().iter().any(|c| matches!(
            c,
            DrawCommand::Line { points, .. } if points[0] == out && points[1] == out
        )));
    }

    #[test]
    fn test_status_line_is_drawn() {
        let mut bay = Patchbay::default();
        let r = bay.spawn(crate::kinds::Relay::<Vec3>::new());
        let _ = bay.create_patch_cord(PortId::output(r, 0), PortId::input(r, 0));
        let list = bay.draw();
        assert_eq!(texts(&list).last(), Some(&"patching failed: patching oneself"));
    }

    #[test]
    fn test_paint_into_egui() {
        let mut bay = Patchbay::default();
        bay.spawn(Constant::new(Vec3::ZERO));
        let list = bay.draw();

        let ctx = egui::Context::default();
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| list.paint(ui.painter()));
        });
        assert!(!output.shapes.is_empty());
    }
}
