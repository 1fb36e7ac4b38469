use std::io;
use ratatui::{
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    Terminal, Frame,
    text::{Line, Span, Text},
};
use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    execute,
    event::{DisableMouseCapture, EnableMouseCapture},
};

use crate::controllers::feed::{FeedController, ToastKind};
use crate::models::post::{time_left, Post, MAX_POST_LEN};
use crate::models::comment::MAX_COMMENT_LEN;
use crate::views::banner::WelcomeBanner;
use crate::views::widgets::{wrap, StatefulList};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Feed,
    Search,
    Create,
    Profile,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Feed, Tab::Search, Tab::Create, Tab::Profile];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Feed => "Inicio",
            Tab::Search => "Buscar",
            Tab::Create => "Crear",
            Tab::Profile => "Perfil",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }
}

/// Presentation-only state: where the cursor is and what is being typed.
pub struct UiState {
    pub tab: Tab,
    pub feed_list: StatefulList<String>,
    pub search_list: StatefulList<String>,
    pub comment_list: StatefulList<String>,
    pub search_query: String,
    pub draft: String,
    pub image_url: String,
    pub editing_image: bool,
    pub comment_draft: String,
    pub typing_comment: bool,
    pub banner: WelcomeBanner,
}

impl UiState {
    pub fn new(banner: WelcomeBanner) -> Self {
        Self {
            tab: Tab::Feed,
            feed_list: StatefulList::with_items(vec![]),
            search_list: StatefulList::with_items(vec![]),
            comment_list: StatefulList::with_items(vec![]),
            search_query: String::new(),
            draft: String::new(),
            image_url: String::new(),
            editing_image: false,
            comment_draft: String::new(),
            typing_comment: false,
            banner,
        }
    }

    /// Re-reads list contents from the controller after any state change.
    pub fn sync(&mut self, feed: &FeedController) {
        self.feed_list
            .set_items(feed.posts().iter().map(|p| p.id.clone()).collect());
        self.search_list.set_items(
            feed.search(&self.search_query)
                .iter()
                .map(|p| p.id.clone())
                .collect(),
        );
        self.comment_list
            .set_items(feed.thread().iter().map(|e| e.comment.id.clone()).collect());
    }

    /// Post under the cursor on the current tab.
    pub fn selected_post(&self) -> Option<&str> {
        match self.tab {
            Tab::Feed => self.feed_list.selected_item().map(String::as_str),
            Tab::Search => self.search_list.selected_item().map(String::as_str),
            _ => None,
        }
    }
}

pub fn setup_terminal() -> io::Result<Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

pub fn restore_terminal(terminal: &mut Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()
}

fn panel(title: &str) -> Block<'_> {
    Block::default().title(title).borders(Borders::ALL)
}

pub fn render_ui<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &mut FeedController,
    ui: &mut UiState,
) {
    let banner_height = if ui.banner.message().is_some() { 3 } else { 0 };
    let toast_height = feed.toasts().count() as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(banner_height),
            Constraint::Min(5),
            Constraint::Length(toast_height),
            Constraint::Length(1),
        ].as_ref())
        .split(f.size());

    let tabs = Tabs::new(Tab::ALL.iter().map(|t| Line::from(t.title())).collect::<Vec<Line>>())
        .block(panel("BRUTAL24"))
        .select(ui.tab.index())
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[0]);

    if let Some(message) = ui.banner.message() {
        let banner = Paragraph::new(message)
            .style(Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL).title("x para cerrar"))
            .wrap(Wrap { trim: true });
        f.render_widget(banner, chunks[1]);
    }

    match ui.tab {
        Tab::Feed => render_feed(f, feed, ui, chunks[2]),
        Tab::Search => render_search(f, feed, ui, chunks[2]),
        Tab::Create => render_create(f, feed, ui, chunks[2]),
        Tab::Profile => render_profile(f, feed, chunks[2]),
    }

    if feed.selected_post().is_some() {
        render_thread(f, feed, ui, centered(f.size(), 80, 80));
    }

    let toasts: Vec<Line> = feed
        .toasts()
        .map(|t| {
            let color = match t.kind {
                ToastKind::Success => Color::Green,
                ToastKind::Error => Color::Red,
                ToastKind::Alert => Color::Magenta,
            };
            Line::from(vec![
                Span::styled(format!(" {} ", t.title), Style::default().fg(Color::Black).bg(color)),
                Span::raw(format!(" {}", t.description)),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(toasts), chunks[3]);

    f.render_widget(
        Paragraph::new(help_line(ui, feed)).style(Style::default().fg(Color::DarkGray)),
        chunks[4],
    );
}

fn help_line(ui: &UiState, feed: &FeedController) -> &'static str {
    if feed.selected_post().is_some() {
        if ui.typing_comment {
            return "Enter enviar · Esc cancelar";
        }
        return "j/k mover · i comentar · r responder · Esc cerrar";
    }
    match ui.tab {
        Tab::Feed => "j/k mover · l me gusta · c comentarios · e leer más · r recargar · Tab pestaña · q salir",
        Tab::Search => "escribe para buscar · ↑/↓ mover · Enter comentarios · Esc volver",
        Tab::Create => "escribe tu publicación · ↑/↓ texto o imagen · Enter publicar · Esc volver",
        Tab::Profile => "Tab pestaña · q salir",
    }
}

fn post_item<'a>(feed: &mut FeedController, post: &Post, width: usize) -> ListItem<'a> {
    let avatar = feed.avatar(&post.username);
    let now = feed.now();
    let expanded = feed.is_expanded(&post.id);
    let pending = feed.is_liking(&post.id);

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", avatar.glyph), Style::default().bg(avatar.color)),
        Span::styled(
            format!(" @{}", post.username),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  {}  ", post.created_at.with_timezone(&chrono::Local).format("%H:%M"))),
        Span::styled(
            format!("⏱ {}", time_left(post.expires_at, now)),
            Style::default().fg(Color::White).bg(Color::Red),
        ),
    ])];

    lines.push(Line::from(""));
    lines.extend(wrap(&post.excerpt(expanded), width).into_iter().map(Line::from));
    if post.needs_read_more() {
        let toggle = if expanded { "▲ Ver menos" } else { "▼ Leer más" };
        lines.push(Line::from(Span::styled(toggle, Style::default().fg(Color::Blue))));
    }
    if let Some(url) = &post.image_url {
        lines.push(Line::from(Span::styled(
            format!("[imagen] {}", url),
            Style::default().add_modifier(Modifier::ITALIC),
        )));
    }

    let heart_style = if post.user_has_liked {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let heart = if post.user_has_liked { "♥" } else { "♡" };
    lines.push(Line::from(vec![
        Span::styled(format!("{} {}", heart, post.likes_count), heart_style),
        Span::raw(if pending { " …" } else { "" }),
        Span::raw(format!("   💬 {}", post.comments_count)),
    ]));
    lines.push(Line::from(""));

    ListItem::new(lines)
}

fn post_list<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &mut FeedController,
    ids: &[String],
    state: &mut ListState,
    title: &str,
    area: Rect,
) {
    let width = area.width.saturating_sub(4) as usize;
    let posts: Vec<Post> = ids
        .iter()
        .filter_map(|id| feed.post(id).cloned())
        .collect();
    let items: Vec<ListItem> = posts
        .iter()
        .map(|post| post_item(feed, post, width))
        .collect();

    let list = List::new(items)
        .block(panel(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    f.render_stateful_widget(list, area, state);
}

fn render_feed<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &mut FeedController,
    ui: &mut UiState,
    area: Rect,
) {
    if ui.feed_list.items.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(Span::styled("¡No hay publicaciones aún!", Style::default().add_modifier(Modifier::BOLD))),
            Line::from("¡Sé el primero en compartir algo brutal! (n para crear)"),
        ])
        .alignment(Alignment::Center)
        .block(panel("Feed"));
        f.render_widget(empty, area);
        return;
    }

    post_list(f, feed, &ui.feed_list.items, &mut ui.feed_list.state, "Feed", area);
}

fn render_search<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &mut FeedController,
    ui: &mut UiState,
    area: Rect,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)].as_ref())
        .split(area);

    let input = Paragraph::new(format!("🔍 {}▏", ui.search_query)).block(panel("Buscar..."));
    f.render_widget(input, chunks[0]);

    if ui.search_list.items.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(Span::styled("No se encontraron resultados", Style::default().add_modifier(Modifier::BOLD))),
            Line::from("¡Intenta buscar otra cosa!"),
        ])
        .alignment(Alignment::Center)
        .block(panel("Resultados"));
        f.render_widget(empty, chunks[1]);
        return;
    }

    post_list(f, feed, &ui.search_list.items, &mut ui.search_list.state, "Resultados", chunks[1]);
}

fn render_create<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &FeedController,
    ui: &UiState,
    area: Rect,
) {
    let count = ui.draft.chars().count();
    let counter_style = if count > MAX_POST_LEN {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let title = if feed.is_creating() { "Publicando..." } else { "¿Qué está pasando?" };

    let (body_cursor, image_cursor) = if ui.editing_image { ("", "▏") } else { ("▏", "") };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)].as_ref())
        .split(area);

    let text = Text::from(vec![
        Line::from(format!("{}{}", ui.draft, body_cursor)),
        Line::from(""),
        Line::from(Span::styled(format!("{}/{} caracteres", count, MAX_POST_LEN), counter_style)),
        Line::from("Tu publicación desaparecerá en 24 horas"),
    ]);
    let editor = Paragraph::new(text).block(panel(title)).wrap(Wrap { trim: false });
    f.render_widget(editor, chunks[0]);

    let image = Paragraph::new(format!("{}{}", ui.image_url, image_cursor))
        .block(panel("URL de imagen (opcional)"));
    f.render_widget(image, chunks[1]);
}

fn render_profile<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &mut FeedController,
    area: Rect,
) {
    let user = feed.user().clone();
    let avatar = feed.avatar(&user.username);

    let text = Text::from(vec![
        Line::from(Span::styled(format!("  {}  ", avatar.glyph), Style::default().bg(avatar.color))),
        Line::from(""),
        Line::from(Span::styled(
            format!("@{}", user.username),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Activo desde {}", user.created_at.with_timezone(&chrono::Local).format("%d/%m/%Y"))),
        Line::from(""),
        Line::from(format!("Publicaciones activas: {}", feed.own_post_count())),
        Line::from(format!("Me gusta dados: {}", feed.likes().len())),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(panel("Tu perfil")),
        area,
    );
}

fn render_thread<B: ratatui::backend::Backend>(
    f: &mut Frame<B>,
    feed: &mut FeedController,
    ui: &mut UiState,
    area: Rect,
) {
    let Some(post) = feed.selected_post().cloned() else {
        return;
    };
    let avatar = feed.avatar(&post.username);
    let width = area.width.saturating_sub(6) as usize;

    f.render_widget(Clear, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(area);

    let mut header = vec![Line::from(vec![
        Span::styled(format!("{} ", avatar.glyph), Style::default().bg(avatar.color)),
        Span::styled(format!(" @{}", post.username), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    ])];
    header.extend(wrap(&post.content, width).into_iter().map(Line::from));
    f.render_widget(
        Paragraph::new(header).block(panel("Comentarios")).wrap(Wrap { trim: false }),
        chunks[0],
    );

    let entries: Vec<(String, Option<String>, String, bool)> = feed
        .thread()
        .iter()
        .map(|e| (e.comment.username.clone(), e.label(), e.comment.content.clone(), e.is_reply()))
        .collect();
    let items: Vec<ListItem> = if entries.is_empty() {
        vec![ListItem::new("No hay comentarios aún. ¡Sé el primero!")]
    } else {
        entries
            .into_iter()
            .map(|(username, label, content, is_reply)| {
                let indent = if is_reply { "    ↳ " } else { "" };
                let avatar = feed.avatar(&username);
                let mut lines = vec![Line::from(vec![
                    Span::raw(indent.to_string()),
                    Span::styled(format!("{} ", avatar.glyph), Style::default().bg(avatar.color)),
                    Span::styled(format!(" @{}", username), Style::default().add_modifier(Modifier::BOLD)),
                ])];
                if let Some(label) = label {
                    lines.push(Line::from(Span::styled(
                        format!("{}{}", indent, label),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                lines.extend(
                    wrap(&content, width.saturating_sub(indent.chars().count()))
                        .into_iter()
                        .map(|l| Line::from(format!("{}{}", indent, l))),
                );
                ListItem::new(lines)
            })
            .collect()
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::LEFT | Borders::RIGHT))
        .highlight_style(Style::default().bg(Color::DarkGray));
    f.render_stateful_widget(list, chunks[1], &mut ui.comment_list.state);

    let title = match feed.replying_to() {
        Some(target) => format!("Respondiendo a @{}", target.username),
        None if feed.is_commenting(&post.id) => "Enviando...".to_string(),
        None => "Añade un comentario".to_string(),
    };
    let count = ui.comment_draft.chars().count();
    let cursor = if ui.typing_comment { "▏" } else { "" };
    let input = Paragraph::new(format!("{}{}  ({}/{})", ui.comment_draft, cursor, count, MAX_COMMENT_LEN))
        .block(panel(&title));
    f.render_widget(input, chunks[2]);
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ].as_ref())
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ].as_ref())
        .split(vertical[1])[1]
}
