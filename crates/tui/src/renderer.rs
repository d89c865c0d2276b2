use std::collections::BTreeMap;
use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use barrage_core::engine::{Engine, NodeId, RenderSurface, TextMeasurer};
use barrage_protocol::{Comment, EngineOptions, Motion, Placement};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Style},
    widgets::Block,
};

/// One terminal cell per glyph, one row per lane.
struct CellMeasurer;

impl TextMeasurer for CellMeasurer {
    fn measure(&self, text: &str, _font_size: f64) -> (f64, f64) {
        (text.chars().count() as f64, 1.0)
    }
}

struct Node {
    comment: Comment,
    placement: Placement,
    /// Media position at mount time; animation progress is measured against
    /// it so pausing freezes everything on screen.
    mounted_pos: f64,
}

#[derive(Default)]
struct TermSurface {
    nodes: BTreeMap<NodeId, Node>,
    position: f64,
}

impl RenderSurface for TermSurface {
    fn mount(&mut self, id: NodeId, comment: &Comment, placement: &Placement) {
        self.nodes.insert(
            id,
            Node {
                comment: comment.clone(),
                placement: placement.clone(),
                mounted_pos: self.position,
            },
        );
    }

    fn remove(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }
}

struct DrawCell {
    x: f64,
    y: f64,
    text: String,
    color: Color,
}

fn layout(surface: &TermSurface, cols: f64, rows: f64, display_area_rate: f64) -> Vec<DrawCell> {
    let scroll_band = (rows * display_area_rate).max(1.0);
    surface
        .nodes
        .values()
        .map(|node| {
            let p = &node.placement;
            let elapsed = (surface.position - node.mounted_pos) + p.delay;
            let total = p.duration + p.delay;
            match &p.motion {
                Motion::Scroll { from_x, to_x } => DrawCell {
                    x: from_x + (to_x - from_x) * (elapsed / total).clamp(0.0, 1.0),
                    y: p.lane % scroll_band,
                    text: node.comment.text.clone(),
                    color: color_of(&node.comment),
                },
                Motion::Rest { from_bottom } => DrawCell {
                    x: ((cols - p.width) / 2.0).max(0.0),
                    y: if *from_bottom {
                        rows - 1.0 - (p.lane % rows)
                    } else {
                        p.lane % rows
                    },
                    text: node.comment.text.clone(),
                    color: color_of(&node.comment),
                },
                Motion::Transform(spec) => {
                    let (x, y) = spec.pose_at(elapsed).translation();
                    DrawCell {
                        x,
                        y,
                        text: spec.text.clone(),
                        color: color_of(&node.comment),
                    }
                }
            }
        })
        .collect()
}

fn color_of(comment: &Comment) -> Color {
    Color::Rgb(comment.color.r, comment.color.g, comment.color.b)
}

pub fn run(comments: Vec<Comment>) -> Result<()> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let mut cols = f64::from(size.width);
    let mut rows = f64::from(size.height.saturating_sub(1));

    // The velocity model is tuned for pixels; damp it for cell space.
    let options = EngineOptions {
        speed: 0.15,
        ..EngineOptions::default()
    };
    let mut engine = Engine::new(TermSurface::default(), options, cols, rows);
    engine.set_measurer(Box::new(CellMeasurer));
    engine.load_feed(comments);
    engine.handle_play();

    let mut position = 0.0_f64;
    let mut hidden = false;
    let mut last = Instant::now();

    loop {
        let dt = last.elapsed().as_secs_f64();
        last = Instant::now();
        if engine.is_playing() {
            position += dt;
        }
        engine.surface_mut().position = position;
        engine.tick(position);

        let cells = layout(engine.surface(), cols, rows, engine.options().display_area_rate);
        let playing = engine.is_playing();
        let live = engine.active_count();

        terminal.draw(|frame| {
            let area = frame.area();
            let header_area = Rect::new(0, 0, area.width, 1);
            let state = if hidden {
                "hidden"
            } else if playing {
                "playing"
            } else {
                "paused"
            };
            let header = Block::default()
                .title(format!(
                    " barrage — {position:.1}s | {live} live | {state} | space pause | ←/→ seek | h hide | q quit "
                ))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, header_area);

            let content = Rect::new(0, 1, area.width, area.height.saturating_sub(1));
            let buf = frame.buffer_mut();
            for cell in &cells {
                if cell.y < 0.0 || cell.y >= f64::from(content.height) {
                    continue;
                }
                let y = content.y + cell.y as u16;
                for (i, ch) in cell.text.chars().enumerate() {
                    let x = cell.x + i as f64;
                    if x < 0.0 || x >= f64::from(content.width) {
                        continue;
                    }
                    buf[(content.x + x as u16, y)]
                        .set_char(ch)
                        .set_fg(cell.color)
                        .set_bg(Color::Black);
                }
            }
        })?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char(' ') => {
                        if engine.is_playing() {
                            engine.handle_pause();
                        } else {
                            engine.handle_play();
                        }
                    }
                    KeyCode::Right => {
                        position += 10.0;
                        engine.handle_seeking(position);
                        engine.handle_seeked();
                    }
                    KeyCode::Left => {
                        position = (position - 10.0).max(0.0);
                        engine.handle_seeking(position);
                        engine.handle_seeked();
                    }
                    KeyCode::Char('h') => {
                        hidden = !hidden;
                        engine.set_hidden(hidden);
                    }
                    _ => {}
                },
                Event::Resize(w, h) => {
                    cols = f64::from(w);
                    rows = f64::from(h.saturating_sub(1));
                    engine.handle_resize(cols, rows);
                }
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}
