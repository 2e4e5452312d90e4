use std::time::{Duration, Instant};

use cardspot::{
    celebration::Confetti,
    game::Phase,
    layout::{RoundLayout, Slot},
    scoring::{CompletionReason, MetricsReport},
    stage::Stage,
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::{App, AppState};

const GUTTER: u16 = 1;

pub fn draw(f: &mut Frame, app: &App) {
    f.render_widget(app, f.area());
}

/// Part of the terminal used for cards: everything between the status
/// line and the hint line.
pub fn stage_area(width: u16, height: u16) -> Rect {
    Rect::new(0, 1, width, height.saturating_sub(2))
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        match self.state {
            AppState::Ready => {
                let lines = vec![
                    Line::from(Span::styled("cardspot", bold_style.fg(Color::Cyan))),
                    Line::from(""),
                    Line::from(format!(
                        "Watch each card, then pick it out again. Item set: {}",
                        self.machine.item_set().name
                    )),
                    Line::from(""),
                    Line::from(Span::styled(
                        "(space) start / (1-4 or click) pick / (esc) quit",
                        Style::default().add_modifier(Modifier::ITALIC),
                    )),
                ];
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .render(centered(area, 7), buf);
            }
            AppState::Playing => {
                let stage = self.stage.borrow();
                render_status(self, Rect::new(area.x, area.y, area.width, 1), buf);

                let cards = stage_area(area.width, area.height);
                let cards = Rect::new(area.x + cards.x, area.y + cards.y, cards.width, cards.height);
                if let Some(layout) = self.machine.visible_items() {
                    render_cards(self, &stage, layout, cards, buf);
                }

                if area.height > 1 {
                    let mut spans = Vec::new();
                    if let Some(caption) = &stage.caption {
                        spans.push(Span::styled(caption.clone(), bold_style.fg(Color::Magenta)));
                        spans.push(Span::raw("  "));
                    }
                    spans.push(Span::styled(
                        format!("round score {}", self.machine.scorecard().tally().score()),
                        bold_style,
                    ));
                    spans.push(Span::styled("  (1-4 or click) pick / (r) restart", dim_style));
                    Paragraph::new(Line::from(spans)).render(
                        Rect::new(area.x, area.y + area.height - 1, area.width, 1),
                        buf,
                    );
                }

                if stage.confetti.is_active() {
                    render_confetti(&stage.confetti, area, buf);
                }
            }
            AppState::Results => {
                let mut lines = match self.last_report() {
                    Some(report) => results_lines(report),
                    None => vec![Line::from("No report")],
                };
                if let Some(summary) = &self.summary {
                    lines.push(Line::from(""));
                    lines.push(Line::from(format!(
                        "history: {} playthroughs, {} successful{}",
                        summary.playthroughs,
                        summary.successes,
                        summary
                            .best_score
                            .map(|best| format!(", best {:.0}%", best * 100.0))
                            .unwrap_or_default()
                    )));
                }
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "(space) play again / (esc) quit",
                    Style::default().add_modifier(Modifier::ITALIC),
                )));
                let height = lines.len() as u16;
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .render(centered(area, height), buf);

                let stage = self.stage.borrow();
                if stage.confetti.is_active() {
                    render_confetti(&stage.confetti, area, buf);
                }
            }
        }
    }
}

fn render_status(app: &App, area: Rect, buf: &mut Buffer) {
    let state = app.machine.state();
    let phase = app.machine.phase();
    let mut text = format!(
        "{}  level {}  round {}  prompt {}/{}  {}s",
        app.machine.item_set().name,
        state.level(),
        state.sub_level(),
        state.step(),
        app.machine.config().rules.auto_pass_limit,
        app.machine.elapsed_secs()
    );
    let hint = match phase {
        Phase::Demonstrating => "  watch",
        Phase::DemoGap => "  remember it",
        Phase::AwaitingResponse => "  pick it!",
        Phase::Retrying => "  again",
        Phase::Settling | Phase::Idle => "",
    };
    text.push_str(hint);
    Paragraph::new(Span::styled(
        text,
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .render(area, buf);
}

fn render_cards(app: &App, stage: &Stage, layout: &RoundLayout, area: Rect, buf: &mut Buffer) {
    let now = Instant::now();
    for slot in Slot::POOL {
        let Some(item) = layout.item_at(slot) else {
            continue;
        };
        let rect = quadrant(area, slot);
        if rect.width < 3 || rect.height < 3 {
            continue;
        }
        let pulsing = stage
            .pulse
            .is_some_and(|p| p.slot == slot && p.is_bright(now));
        let border_style = if pulsing {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(rect);
        block.render(rect, buf);

        let label = fit_label(app.machine.item_label(item), inner.width as usize);
        let label_area = Rect::new(inner.x, inner.y + inner.height / 2, inner.width, 1);
        Paragraph::new(Span::styled(
            label,
            border_style.add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(label_area, buf);
    }
}

fn results_lines(report: &MetricsReport) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let (headline, color) = match report.reason {
        CompletionReason::Success => ("Well spotted!", Color::Green),
        CompletionReason::TimedOut => ("Time ran out", Color::Red),
    };
    let took = HumanTime::from(Duration::from_secs(report.duration_secs))
        .to_text_en(Accuracy::Precise, Tense::Present);

    vec![
        Line::from(Span::styled(headline, bold_style.fg(color))),
        Line::from(""),
        Line::from(format!(
            "{} ({})",
            report.reason,
            if report.reason == CompletionReason::Success {
                "all levels cleared"
            } else {
                "too many prompts went unanswered"
            }
        )),
        Line::from(Span::styled(
            format!("score {:.0}%", report.aggregate_score * 100.0),
            bold_style,
        )),
        Line::from(format!(
            "{} of {} picks matched, {} prompts shown",
            report.success_interactions, report.total_interactions, report.windows_opened
        )),
        Line::from(format!("took {took}")),
    ]
}

/// Quadrant rect for a slot, leaving a gutter between cards.
fn quadrant(area: Rect, slot: Slot) -> Rect {
    let (row, col) = slot.grid();
    let half_w = area.width / 2;
    let half_h = area.height / 2;
    let x = area.x + col as u16 * half_w;
    let y = area.y + row as u16 * half_h;
    let width = if col == 0 { half_w } else { area.width - half_w };
    let height = if row == 0 { half_h } else { area.height - half_h };
    Rect::new(
        x + GUTTER,
        y + GUTTER,
        width.saturating_sub(GUTTER * 2),
        height.saturating_sub(GUTTER * 2),
    )
}

fn centered(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect::new(
        area.x,
        area.y + (area.height - height) / 2,
        area.width,
        height,
    )
}

/// Truncates a label to `width` terminal columns, marking the cut.
fn fit_label(label: &str, width: usize) -> String {
    if label.width() <= width {
        return label.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in label.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    if width > 0 {
        out.push('…');
    }
    out
}

fn render_confetti(confetti: &Confetti, area: Rect, buf: &mut Buffer) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::Red,
        Color::Blue,
        Color::LightYellow,
    ];

    for particle in &confetti.particles {
        let x = particle.x as u16;
        let y = particle.y as u16;
        if x >= area.width || y >= area.height {
            continue;
        }
        let color = colors[particle.color_index % colors.len()];
        let alpha = 1.0 - (particle.age / particle.max_age);
        let style = if alpha > 0.7 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if alpha > 0.3 {
            Style::default().fg(color)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };
        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&particle.symbol.to_string());
            cell.set_style(style);
        }
    }

    if let Some(cheer) = confetti.cheer {
        let (cx, cy) = confetti.cheer_at;
        let y = (cy as u16).min(area.height.saturating_sub(1));
        let x = (cx as u16).saturating_sub(cheer.width() as u16 / 2);
        if x < area.width {
            let width = (cheer.width() as u16).min(area.width - x);
            Paragraph::new(Span::styled(
                cheer,
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .render(Rect::new(area.x + x, area.y + y, width, 1), buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardspot::{
        collaborators::Collaborators,
        config::Config,
        game::Machine,
        history::ReportStore,
        simulate::{run_playthrough, Learner},
        stage::{SharedStage, StageAudio, StageCelebration, StageCue},
    };

    fn create_test_app() -> App {
        let config = Config {
            seed: Some(11),
            ..Config::default()
        };
        let stage = SharedStage::default();
        let collab = Collaborators::headless(&config.timing)
            .with_cue(StageCue::new(
                stage.clone(),
                Duration::ZERO,
                Duration::from_millis(500),
            ))
            .with_audio(StageAudio(stage.clone()))
            .with_celebration(StageCelebration(stage.clone()));
        let machine = Machine::new(config, collab).unwrap();
        let mut app = App::new(machine, stage, Some(ReportStore::in_memory().unwrap()));
        app.resize(80, 24);
        app
    }

    fn render(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_ready_screen_shows_controls() {
        let app = create_test_app();
        let rendered = render(&app, 80, 24);
        assert!(rendered.contains("cardspot"));
        assert!(rendered.contains("(space) start"));
    }

    #[test]
    fn test_demo_shows_target_card() {
        let mut app = create_test_app();
        app.start();
        let rendered = render(&app, 80, 24);
        assert!(rendered.contains("Dentist"));
        assert!(rendered.contains("level 1"));
        assert!(rendered.contains("watch"));
        assert!(rendered.contains("♪ Dentist"));
    }

    #[test]
    fn test_gap_hides_cards() {
        let mut app = create_test_app();
        app.start();
        app.advance(Duration::from_secs(6));
        assert_eq!(app.machine.phase(), Phase::DemoGap);
        let rendered = render(&app, 80, 24);
        assert!(!rendered.contains('┌'));
        assert!(rendered.contains("remember it"));
    }

    #[test]
    fn test_level_two_shows_two_cards() {
        let mut app = create_test_app();
        app.start();
        while app.machine.state().level() < 2 {
            app.advance(Duration::from_millis(100));
            if app.machine.phase() == Phase::AwaitingResponse {
                let target = app.machine.state().target();
                let slot = app.machine.layout().unwrap().slot_of(target).unwrap();
                app.machine
                    .handle_pointer(cardspot::collaborators::PointerEvent::at_slot(slot));
            }
        }
        while app.machine.phase() != Phase::AwaitingResponse {
            app.advance(Duration::from_millis(100));
        }
        let layout = app.machine.visible_items().unwrap();
        assert_eq!(layout.len(), 2);

        let rendered = render(&app, 80, 24);
        for placement in layout.placements() {
            assert!(rendered.contains(app.machine.item_label(placement.item)));
        }
    }

    #[test]
    fn test_results_screen() {
        let mut app = create_test_app();
        run_playthrough(&mut app.machine, Learner::perfect(), Duration::from_millis(100)).unwrap();
        app.state = AppState::Results;

        let rendered = render(&app, 80, 24);
        assert!(rendered.contains("Well spotted!"));
        assert!(rendered.contains("score 100%"));
        assert!(rendered.contains("9 of 9 picks matched"));
        assert!(rendered.contains("play again"));
    }

    #[test]
    fn test_small_and_extreme_sizes_do_not_panic() {
        let mut app = create_test_app();
        app.start();
        for (w, h) in [(1, 1), (5, 3), (20, 5), (200, 60)] {
            app.resize(w, h);
            render(&app, w, h);
        }
    }

    #[test]
    fn test_confetti_renders_over_stage() {
        let app = create_test_app();
        app.stage.borrow_mut().confetti.burst(40.0, 12.0, 80, 24);
        let area = Rect::new(0, 0, 80, 24);
        let mut buffer = Buffer::empty(area);
        render_confetti(&app.stage.borrow().confetti, area, &mut buffer);
        let cheer = app.stage.borrow().confetti.cheer.unwrap();
        let rendered = buffer
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>();
        assert!(rendered.contains(cheer));
    }

    #[test]
    fn test_fit_label() {
        assert_eq!(fit_label("Nurse", 10), "Nurse");
        assert_eq!(fit_label("Ambulance", 5), "Ambu…");
        assert_eq!(fit_label("救急車", 4), "救…");
        assert_eq!(fit_label("Doctor", 0), "");
    }

    #[test]
    fn test_quadrants_do_not_overlap() {
        let area = stage_area(80, 24);
        let tl = quadrant(area, Slot::TopLeft);
        let br = quadrant(area, Slot::BottomRight);
        assert!(!tl.intersects(br));
        assert!(tl.x + tl.width <= br.x);
        assert!(tl.y + tl.height <= br.y);
    }
}
