use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::controllers::context::AppContext;
use crate::error::Result;
use crate::models::avatar::{Avatar, AvatarCache};
use crate::models::clock::Clock;
use crate::models::comment::{self, Comment, NewComment, ReplyTarget, ThreadEntry};
use crate::models::identity;
use crate::models::likes::{self, LikeSet};
use crate::models::notifications::Permission;
use crate::models::post::{NewPost, Post};
use crate::models::realtime::RealtimeEvent;
use crate::models::storage::{LocalStore, LIKES_KEY};
use crate::models::AnonymousUser;

const MAX_TOASTS: usize = 4;
const TOAST_TTL_SECS: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    /// Push-style alert, only raised with notification permission.
    Alert,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
    pub raised_at: DateTime<Utc>,
}

/// Backend work requested by the controller. The caller runs it wherever
/// it likes and feeds the [`Outcome`] back through [`FeedController::apply`].
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    FetchPosts,
    CreatePost(NewPost),
    CommitLike {
        post_id: String,
        likes_count: u32,
        user_id: String,
        likes: LikeSet,
    },
    InsertComment(NewComment),
    FetchComments { post_id: String },
    DeleteExpired { now: DateTime<Utc> },
}

#[derive(Debug)]
pub enum Outcome {
    PostsFetched(Result<Vec<Post>>),
    PostCreated(Result<Post>),
    LikeCommitted { post_id: String, result: Result<()> },
    CommentInserted { post_id: String, reply: bool, result: Result<Comment> },
    CommentsFetched { post_id: String, result: Result<Vec<Comment>> },
    ExpiredDeleted(Result<()>),
}

impl Effect {
    pub async fn run(self, ctx: &AppContext) -> Outcome {
        let backend = ctx.backend.as_ref();
        match self {
            Effect::FetchPosts => Outcome::PostsFetched(backend.fetch_live_posts(ctx.clock.now()).await),
            Effect::CreatePost(post) => Outcome::PostCreated(backend.insert_post(&post).await),
            Effect::CommitLike {
                post_id,
                likes_count,
                user_id,
                likes,
            } => {
                let result = backend.update_likes_count(&post_id, likes_count).await;
                if result.is_ok() {
                    if let Err(e) = likes::sync_likes(&ctx.store, backend, &user_id, &likes).await {
                        log::error!("Error syncing likes: {}", e);
                    }
                }
                Outcome::LikeCommitted { post_id, result }
            }
            Effect::InsertComment(comment) => Outcome::CommentInserted {
                post_id: comment.post_id.clone(),
                reply: comment.parent_id.is_some(),
                result: backend.insert_comment(&comment).await,
            },
            Effect::FetchComments { post_id } => {
                let result = backend.fetch_comments(&post_id).await;
                Outcome::CommentsFetched { post_id, result }
            }
            Effect::DeleteExpired { now } => Outcome::ExpiredDeleted(backend.delete_expired_posts(now).await),
        }
    }
}

/// Every way the in-memory post list can change.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedChange {
    /// Authoritative list from a fetch.
    Replace(Vec<Post>),
    /// New row: prepended, or replacing a row with the same id.
    Insert(Post),
    /// Changed row: replaces by id, ignored when absent.
    Update(Post),
    Remove(String),
    Likes { post_id: String, likes_count: u32 },
    CommentAdded(String),
    /// Drops whatever has expired by now.
    Expire,
}

/// Client-side state of the feed: the single render source plus the
/// in-flight bookkeeping for optimistic actions.
pub struct FeedController {
    store: LocalStore,
    clock: Arc<dyn Clock>,
    user: AnonymousUser,
    likes: LikeSet,
    posts: Vec<Post>,
    selected_post: Option<String>,
    comments: Vec<Comment>,
    replying_to: Option<ReplyTarget>,
    // post id -> liked state before the pending toggle
    liking: HashMap<String, bool>,
    // post id -> comments_count when the comment was submitted
    commenting: HashMap<String, u32>,
    creating: bool,
    expanded: HashSet<String>,
    toasts: VecDeque<Toast>,
    permission: Permission,
    notifications_enabled: bool,
    avatars: AvatarCache,
}

impl FeedController {
    pub fn new(ctx: &AppContext, user: AnonymousUser, likes: LikeSet) -> Self {
        Self {
            store: ctx.store.clone(),
            clock: ctx.clock.clone(),
            user,
            likes,
            posts: Vec::new(),
            selected_post: None,
            comments: Vec::new(),
            replying_to: None,
            liking: HashMap::new(),
            commenting: HashMap::new(),
            creating: false,
            expanded: HashSet::new(),
            toasts: VecDeque::new(),
            permission: Permission::load(&ctx.store),
            notifications_enabled: ctx.config.notifications,
            avatars: AvatarCache::default(),
        }
    }

    /// Identity, like state, then the first fetch.
    pub async fn bootstrap(ctx: &AppContext) -> Self {
        let user = identity::get_anonymous_user(&ctx.store, ctx.backend.clone(), ctx.clock.as_ref()).await;
        let likes = likes::get_user_likes(&ctx.store, ctx.backend.as_ref(), &user.id).await;
        let mut feed = Self::new(ctx, user, likes);
        feed.dispatch(ctx, Effect::FetchPosts).await;
        feed
    }

    /// Runs an effect and every follow-up it causes, in order.
    pub async fn dispatch(&mut self, ctx: &AppContext, effect: Effect) {
        let mut queue = VecDeque::from([effect]);
        while let Some(effect) = queue.pop_front() {
            let outcome = effect.run(ctx).await;
            queue.extend(self.apply(outcome));
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn user(&self) -> &AnonymousUser {
        &self.user
    }

    pub fn likes(&self) -> &LikeSet {
        &self.likes
    }

    /// Live posts, newest first.
    pub fn posts(&self) -> Vec<&Post> {
        let now = self.now();
        self.posts.iter().filter(|p| p.is_live(now)).collect()
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        let now = self.now();
        self.posts.iter().find(|p| p.id == post_id && p.is_live(now))
    }

    /// Case-insensitive match on body or handle over the loaded posts.
    pub fn search(&self, query: &str) -> Vec<&Post> {
        self.posts().into_iter().filter(|p| p.matches(query)).collect()
    }

    pub fn own_post_count(&self) -> usize {
        self.posts().iter().filter(|p| p.user_id == self.user.id).count()
    }

    pub fn is_liking(&self, post_id: &str) -> bool {
        self.liking.contains_key(post_id)
    }

    pub fn is_commenting(&self, post_id: &str) -> bool {
        self.commenting.contains_key(post_id)
    }

    pub fn is_creating(&self) -> bool {
        self.creating
    }

    pub fn avatar(&mut self, handle: &str) -> Avatar {
        self.avatars.get(handle)
    }

    pub fn is_expanded(&self, post_id: &str) -> bool {
        self.expanded.contains(post_id)
    }

    pub fn toggle_expanded(&mut self, post_id: &str) {
        if !self.expanded.remove(post_id) {
            self.expanded.insert(post_id.to_string());
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// First user interaction: settle the alert permission.
    pub fn request_permission(&mut self) {
        self.permission = self.permission.request(&self.store, self.notifications_enabled);
    }

    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn prune_toasts(&mut self) {
        let cutoff = self.now() - Duration::seconds(TOAST_TTL_SECS);
        self.toasts.retain(|t| t.raised_at > cutoff);
    }

    fn toast(&mut self, kind: ToastKind, title: &str, description: &str) {
        if self
            .toasts
            .back()
            .is_some_and(|last| last.title == title && last.description == description)
        {
            return;
        }
        if self.toasts.len() == MAX_TOASTS {
            self.toasts.pop_front();
        }
        let raised_at = self.now();
        self.toasts.push_back(Toast {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            raised_at,
        });
    }

    fn notify(&mut self, title: &str, body: &str) {
        if self.permission == Permission::Granted {
            self.toast(ToastKind::Alert, title, body);
        }
    }

    /// The single place the post list is mutated. Afterwards the list holds
    /// only live posts and every viewer flag mirrors the like set.
    pub fn merge(&mut self, change: FeedChange) {
        match change {
            FeedChange::Replace(posts) => self.posts = posts,
            FeedChange::Insert(post) => {
                self.posts.retain(|p| p.id != post.id);
                self.posts.insert(0, post);
            }
            FeedChange::Update(post) => {
                if let Some(slot) = self.posts.iter_mut().find(|p| p.id == post.id) {
                    *slot = post;
                }
            }
            FeedChange::Remove(post_id) => self.posts.retain(|p| p.id != post_id),
            FeedChange::Likes { post_id, likes_count } => {
                if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
                    post.likes_count = likes_count;
                }
            }
            FeedChange::CommentAdded(post_id) => {
                if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
                    post.comments_count = post.comments_count.saturating_add(1);
                }
            }
            FeedChange::Expire => {}
        }

        let now = self.now();
        self.posts.retain(|p| p.is_live(now));
        for post in &mut self.posts {
            post.user_has_liked = self.likes.contains(&post.id);
        }

        let thread_gone = self
            .selected_post
            .as_ref()
            .is_some_and(|selected| !self.posts.iter().any(|p| &p.id == selected));
        if thread_gone {
            self.close_thread();
        }
    }

    pub fn refresh(&self) -> Effect {
        Effect::FetchPosts
    }

    /// Optimistic like/unlike. `None` when a toggle for this post is still
    /// pending or the post is not loaded.
    pub fn toggle_like(&mut self, post_id: &str) -> Option<Effect> {
        if self.is_liking(post_id) {
            log::debug!("Ignoring like on {} while a toggle is pending", post_id);
            return None;
        }
        let post = self.post(post_id)?;

        let has_liked = self.likes.contains(post_id);
        let likes_count = if has_liked {
            post.likes_count.saturating_sub(1)
        } else {
            post.likes_count.saturating_add(1)
        };

        self.liking.insert(post_id.to_string(), has_liked);
        if has_liked {
            self.likes.remove(post_id);
        } else {
            self.likes.insert(post_id);
        }
        self.persist_likes();
        self.merge(FeedChange::Likes {
            post_id: post_id.to_string(),
            likes_count,
        });

        Some(Effect::CommitLike {
            post_id: post_id.to_string(),
            likes_count,
            user_id: self.user.id.clone(),
            likes: self.likes.clone(),
        })
    }

    fn persist_likes(&self) {
        if let Err(e) = self.store.save(LIKES_KEY, &self.likes) {
            log::error!("Failed to persist likes: {}", e);
        }
    }

    pub fn create_post(&mut self, content: &str, image_url: Option<String>) -> Option<Effect> {
        if self.creating {
            return None;
        }

        match NewPost::new(&self.user.id, &self.user.username, content, image_url, self.now()) {
            Ok(post) => {
                self.creating = true;
                Some(Effect::CreatePost(post))
            }
            Err(e) => {
                self.toast(ToastKind::Error, "Error", &e.to_string());
                None
            }
        }
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.selected_post.as_deref().and_then(|id| self.post(id))
    }

    pub fn open_thread(&mut self, post_id: &str) -> Option<Effect> {
        self.post(post_id)?;
        if self.selected_post.as_deref() != Some(post_id) {
            self.comments.clear();
            self.replying_to = None;
        }
        self.selected_post = Some(post_id.to_string());
        Some(Effect::FetchComments {
            post_id: post_id.to_string(),
        })
    }

    pub fn close_thread(&mut self) {
        self.selected_post = None;
        self.comments.clear();
        self.replying_to = None;
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn thread(&self) -> Vec<ThreadEntry<'_>> {
        comment::thread(&self.comments)
    }

    pub fn replying_to(&self) -> Option<&ReplyTarget> {
        self.replying_to.as_ref()
    }

    pub fn reply_to(&mut self, comment_id: &str) {
        self.replying_to = self
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| ReplyTarget {
                comment_id: c.id.clone(),
                username: c.username.clone(),
            });
    }

    pub fn cancel_reply(&mut self) {
        self.replying_to = None;
    }

    /// Comment on `post_id`, as a reply when a reply target is set.
    pub fn submit_comment(&mut self, post_id: &str, content: &str) -> Option<Effect> {
        if self.is_commenting(post_id) {
            return None;
        }
        let counted_before = self.post(post_id)?.comments_count;

        let parent_id = self.replying_to.as_ref().map(|r| r.comment_id.clone());
        match NewComment::new(post_id, &self.user.id, &self.user.username, content, parent_id) {
            Ok(comment) => {
                self.commenting.insert(post_id.to_string(), counted_before);
                Some(Effect::InsertComment(comment))
            }
            Err(e) => {
                self.toast(ToastKind::Error, "Error", &e.to_string());
                None
            }
        }
    }

    /// Expiry sweep tick: drops expired posts locally now and asks the
    /// backend to delete them.
    pub fn sweep(&mut self) -> Effect {
        let now = self.now();
        self.merge(FeedChange::Expire);
        Effect::DeleteExpired { now }
    }

    pub fn on_realtime(&mut self, event: RealtimeEvent) -> Option<Effect> {
        match event {
            RealtimeEvent::PostInserted(post) => {
                let from_someone_else = post.user_id != self.user.id;
                let author = post.username.clone();
                self.merge(FeedChange::Insert(post));
                if from_someone_else {
                    self.notify("¡Nueva publicación!", &format!("{} ha compartido algo nuevo", author));
                }
                None
            }
            RealtimeEvent::PostUpdated(post) => {
                self.merge(FeedChange::Update(post));
                None
            }
            RealtimeEvent::PostDeleted { id } => {
                self.merge(FeedChange::Remove(id));
                None
            }
            RealtimeEvent::CommentInserted(comment) => {
                if comment.user_id != self.user.id {
                    self.notify("¡Nuevo comentario!", "Alguien ha comentado en una publicación");
                }
                (self.selected_post.as_deref() == Some(comment.post_id.as_str())).then(|| {
                    Effect::FetchComments {
                        post_id: comment.post_id,
                    }
                })
            }
        }
    }

    /// Folds a finished effect back into the state. Returns follow-up work.
    pub fn apply(&mut self, outcome: Outcome) -> Vec<Effect> {
        match outcome {
            Outcome::PostsFetched(Ok(posts)) => {
                self.merge(FeedChange::Replace(posts));
                vec![]
            }
            Outcome::PostsFetched(Err(e)) => {
                log::error!("Error fetching posts: {}", e);
                self.toast(ToastKind::Error, "Error", "No se pudieron cargar las publicaciones");
                vec![]
            }
            Outcome::PostCreated(Ok(post)) => {
                self.creating = false;
                log::info!("Created post {}", post.id);
                self.merge(FeedChange::Insert(post));
                self.toast(
                    ToastKind::Success,
                    "¡Éxito!",
                    "Tu publicación ha sido creada y desaparecerá en 24 horas",
                );
                vec![Effect::FetchPosts]
            }
            Outcome::PostCreated(Err(e)) => {
                self.creating = false;
                log::error!("Error creating post: {}", e);
                self.toast(
                    ToastKind::Error,
                    "Error",
                    "No se pudo crear la publicación. Inténtalo de nuevo.",
                );
                vec![]
            }
            Outcome::LikeCommitted { post_id, result } => {
                let previous = self.liking.remove(&post_id);
                match result {
                    Ok(()) => {
                        // The commit wrote its own snapshot; later toggles win locally.
                        self.persist_likes();
                        vec![]
                    }
                    Err(e) => {
                        log::error!("Error toggling like on {}: {}", post_id, e);
                        if let Some(was_liked) = previous {
                            if was_liked {
                                self.likes.insert(&post_id);
                            } else {
                                self.likes.remove(&post_id);
                            }
                            self.persist_likes();
                        }
                        self.toast(ToastKind::Error, "Error", "No se pudo actualizar el me gusta");
                        vec![Effect::FetchPosts]
                    }
                }
            }
            Outcome::CommentInserted { post_id, reply, result } => {
                let counted_before = self.commenting.remove(&post_id);
                match result {
                    Ok(_) => {
                        self.replying_to = None;
                        // A pushed row update may already carry the new count.
                        let already_counted = match (counted_before, self.post(&post_id)) {
                            (Some(before), Some(post)) => post.comments_count > before,
                            _ => false,
                        };
                        if !already_counted {
                            self.merge(FeedChange::CommentAdded(post_id.clone()));
                        }
                        let description = if reply {
                            "Tu respuesta ha sido publicada"
                        } else {
                            "Tu comentario ha sido publicado"
                        };
                        self.toast(ToastKind::Success, "¡Comentario añadido!", description);
                        vec![Effect::FetchComments { post_id }]
                    }
                    Err(e) => {
                        log::error!("Error adding comment: {}", e);
                        self.toast(
                            ToastKind::Error,
                            "Error",
                            "No se pudo añadir el comentario. Inténtalo de nuevo.",
                        );
                        vec![]
                    }
                }
            }
            Outcome::CommentsFetched { post_id, result } => {
                match result {
                    Ok(comments) => {
                        if self.selected_post.as_deref() == Some(post_id.as_str()) {
                            self.comments = comments;
                        }
                    }
                    Err(e) => {
                        log::error!("Error fetching comments: {}", e);
                        self.toast(ToastKind::Error, "Error", "No se pudieron cargar los comentarios");
                    }
                }
                vec![]
            }
            Outcome::ExpiredDeleted(Ok(())) => vec![],
            Outcome::ExpiredDeleted(Err(e)) => {
                log::warn!("Error deleting expired posts: {}", e);
                self.toast(ToastKind::Error, "Error", "No se pudieron purgar las publicaciones caducadas");
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::{MemoryBackend, Operation};
    use crate::models::clock::ManualClock;
    use crate::models::{Backend, Config};
    use chrono::TimeZone;

    struct Harness {
        _dir: tempfile::TempDir,
        ctx: AppContext,
        backend: Arc<MemoryBackend>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let ctx = AppContext::local(Config::default(), store, backend.clone(), Arc::new(clock.clone()));
        Harness {
            _dir: dir,
            ctx,
            backend,
            clock,
        }
    }

    fn viewer() -> AnonymousUser {
        AnonymousUser {
            id: "anon_viewer".to_string(),
            username: "BrutalFox42".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn seed(h: &Harness, body: &str, likes: u32) -> Post {
        let mut draft = NewPost::new("anon_other", "NeonWolf7", body, None, h.clock.now()).unwrap();
        draft.likes_count = likes;
        h.backend.insert_post(&draft).await.unwrap()
    }

    async fn loaded(h: &Harness) -> FeedController {
        let mut feed = FeedController::new(&h.ctx, viewer(), LikeSet::default());
        feed.dispatch(&h.ctx, Effect::FetchPosts).await;
        feed
    }

    #[tokio::test]
    async fn fetch_merges_viewer_likes() {
        let h = harness();
        let liked = seed(&h, "liked", 3).await;
        h.clock.advance(Duration::minutes(1));
        seed(&h, "other", 0).await;

        let likes: LikeSet = [liked.id.clone()].into_iter().collect();
        let mut feed = FeedController::new(&h.ctx, viewer(), likes);
        feed.dispatch(&h.ctx, Effect::FetchPosts).await;

        let flags: Vec<(&str, bool)> = feed
            .posts()
            .iter()
            .map(|p| (p.content.as_str(), p.user_has_liked))
            .collect();
        assert_eq!(flags, vec![("other", false), ("liked", true)]);
    }

    #[tokio::test]
    async fn pending_toggle_blocks_a_second_one() {
        let h = harness();
        let post = seed(&h, "hola", 0).await;
        let mut feed = loaded(&h).await;

        let first = feed.toggle_like(&post.id).unwrap();
        assert!(feed.toggle_like(&post.id).is_none());
        assert_eq!(feed.post(&post.id).unwrap().likes_count, 1);
        assert!(feed.post(&post.id).unwrap().user_has_liked);

        let outcome = first.run(&h.ctx).await;
        assert!(feed.apply(outcome).is_empty());
        assert!(!feed.is_liking(&post.id));
        assert_eq!(h.backend.post(&post.id).unwrap().likes_count, 1);
        assert_eq!(
            h.backend.stored_likes("anon_viewer").unwrap().post_ids,
            vec![post.id.clone()]
        );

        // Guard released: the next toggle goes through.
        assert!(feed.toggle_like(&post.id).is_some());
        assert_eq!(feed.post(&post.id).unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn unlike_never_goes_negative() {
        let h = harness();
        let post = seed(&h, "cero", 0).await;
        let likes: LikeSet = [post.id.clone()].into_iter().collect();
        let mut feed = FeedController::new(&h.ctx, viewer(), likes);
        feed.dispatch(&h.ctx, Effect::FetchPosts).await;

        let effect = feed.toggle_like(&post.id).unwrap();
        assert!(matches!(effect, Effect::CommitLike { likes_count: 0, .. }));
        assert_eq!(feed.post(&post.id).unwrap().likes_count, 0);
        assert!(!feed.likes().contains(&post.id));
    }

    #[tokio::test]
    async fn failed_like_is_corrected_by_refetch() {
        let h = harness();
        let post = seed(&h, "hola", 5).await;
        let mut feed = loaded(&h).await;
        h.backend.set_failing(Operation::UpdateLikes, true);

        let effect = feed.toggle_like(&post.id).unwrap();
        assert_eq!(feed.post(&post.id).unwrap().likes_count, 6);
        feed.dispatch(&h.ctx, effect).await;

        let restored = feed.post(&post.id).unwrap();
        assert_eq!(restored.likes_count, 5);
        assert!(!restored.user_has_liked);
        assert!(!feed.is_liking(&post.id));
        assert!(feed.toasts().any(|t| t.kind == ToastKind::Error));
        assert_eq!(h.ctx.store.load::<LikeSet>(LIKES_KEY), Some(LikeSet::default()));
    }

    #[tokio::test]
    async fn reply_is_threaded_and_counted() {
        let h = harness();
        let post = seed(&h, "debate", 0).await;
        let mut feed = loaded(&h).await;

        let open = feed.open_thread(&post.id).unwrap();
        feed.dispatch(&h.ctx, open).await;
        let first = feed.submit_comment(&post.id, "primero").unwrap();
        assert!(feed.submit_comment(&post.id, "duplicado").is_none());
        feed.dispatch(&h.ctx, first).await;

        let parent_id = feed.comments()[0].id.clone();
        feed.reply_to(&parent_id);
        let reply = feed.submit_comment(&post.id, "respuesta").unwrap();
        feed.dispatch(&h.ctx, reply).await;

        assert_eq!(feed.post(&post.id).unwrap().comments_count, 2);
        assert!(feed.replying_to().is_none());
        let thread = feed.thread();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[1].label().as_deref(), Some("Respondiendo a @BrutalFox42"));
    }

    #[tokio::test]
    async fn failed_comment_leaves_counter_alone() {
        let h = harness();
        let post = seed(&h, "debate", 0).await;
        let mut feed = loaded(&h).await;
        h.backend.set_failing(Operation::InsertComment, true);

        let effect = feed.submit_comment(&post.id, "no llega").unwrap();
        feed.dispatch(&h.ctx, effect).await;

        assert_eq!(feed.post(&post.id).unwrap().comments_count, 0);
        assert!(!feed.is_commenting(&post.id));
        assert!(feed.toasts().any(|t| t.kind == ToastKind::Error));
    }

    #[tokio::test]
    async fn invalid_bodies_are_rejected_without_effects() {
        let h = harness();
        let post = seed(&h, "x", 0).await;
        let mut feed = loaded(&h).await;

        assert!(feed.create_post("   ", None).is_none());
        assert!(feed.create_post(&"a".repeat(501), None).is_none());
        assert!(feed.submit_comment(&post.id, &"b".repeat(281)).is_none());
        assert!(!feed.is_creating());
        assert_eq!(feed.toasts().count(), 3);
    }

    #[tokio::test]
    async fn realtime_events_splice_the_list() {
        let h = harness();
        let kept = seed(&h, "kept", 0).await;
        h.clock.advance(Duration::minutes(1));
        let gone = seed(&h, "gone", 0).await;
        let mut feed = loaded(&h).await;

        let mut updated = kept.clone();
        updated.likes_count = 9;
        feed.on_realtime(RealtimeEvent::PostUpdated(updated));
        feed.on_realtime(RealtimeEvent::PostDeleted { id: gone.id.clone() });

        let mut fresh = kept.clone();
        fresh.id = "p-new".to_string();
        fresh.content = "fresh".to_string();
        feed.on_realtime(RealtimeEvent::PostInserted(fresh.clone()));
        feed.on_realtime(RealtimeEvent::PostInserted(fresh));

        let ids: Vec<&str> = feed.posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p-new", kept.id.as_str()]);
        assert_eq!(feed.post(&kept.id).unwrap().likes_count, 9);
    }

    #[tokio::test]
    async fn alerts_need_permission() {
        let h = harness();
        let post = seed(&h, "x", 0).await;
        let mut feed = loaded(&h).await;

        let mut other = post.clone();
        other.id = "p2".to_string();
        feed.on_realtime(RealtimeEvent::PostInserted(other.clone()));
        assert_eq!(feed.toasts().count(), 0);

        feed.request_permission();
        assert_eq!(feed.permission(), Permission::Granted);
        other.id = "p3".to_string();
        feed.on_realtime(RealtimeEvent::PostInserted(other));
        assert!(feed.toasts().any(|t| t.kind == ToastKind::Alert));
    }

    #[tokio::test]
    async fn comment_push_refetches_only_the_open_thread() {
        let h = harness();
        let post = seed(&h, "x", 0).await;
        let mut feed = loaded(&h).await;
        let pushed = NewComment::new(&post.id, "anon_other", "NeonWolf7", "hey", None)
            .unwrap()
            .into_comment("c1".to_string(), h.clock.now());

        assert!(feed.on_realtime(RealtimeEvent::CommentInserted(pushed.clone())).is_none());
        feed.open_thread(&post.id);
        assert_eq!(
            feed.on_realtime(RealtimeEvent::CommentInserted(pushed)),
            Some(Effect::FetchComments { post_id: post.id })
        );
    }

    #[tokio::test]
    async fn sweep_enforces_expiry_locally_and_remotely() {
        let h = harness();
        let post = seed(&h, "efímero", 0).await;
        let mut feed = loaded(&h).await;
        assert_eq!(feed.posts().len(), 1);

        h.clock.advance(Duration::hours(24));
        // Hidden from every view even before the sweep runs.
        assert!(feed.posts().is_empty());
        assert!(feed.search("efí").is_empty());

        h.clock.advance(Duration::seconds(1));
        let effect = feed.sweep();
        feed.dispatch(&h.ctx, effect).await;
        assert_eq!(h.backend.delete_calls(), 1);
        assert!(h.backend.post(&post.id).is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_over_body_and_handle() {
        let h = harness();
        seed(&h, "Hola Mundo", 0).await;
        let feed = loaded(&h).await;
        assert_eq!(feed.search("MUNDO").len(), 1);
        assert_eq!(feed.search("neonwolf").len(), 1);
        assert!(feed.search("adiós").is_empty());
    }

    #[tokio::test]
    async fn toasts_expire_and_do_not_repeat() {
        let h = harness();
        let mut feed = loaded(&h).await;
        h.backend.set_failing(Operation::FetchPosts, true);
        feed.dispatch(&h.ctx, Effect::FetchPosts).await;
        feed.dispatch(&h.ctx, Effect::FetchPosts).await;
        assert_eq!(feed.toasts().count(), 1);

        h.clock.advance(Duration::seconds(TOAST_TTL_SECS + 1));
        feed.prune_toasts();
        assert_eq!(feed.toasts().count(), 0);
    }

    #[tokio::test]
    async fn pushed_row_update_before_outcome_counts_comment_once() {
        let h = harness();
        let post = seed(&h, "debate", 0).await;
        let mut feed = loaded(&h).await;
        let mut pushed = h.backend.subscribe();

        let effect = feed.submit_comment(&post.id, "hola").unwrap();
        let outcome = effect.run(&h.ctx).await;
        while let Ok(event) = pushed.try_recv() {
            feed.on_realtime(event);
        }
        assert_eq!(feed.post(&post.id).unwrap().comments_count, 1);
        feed.apply(outcome);

        assert_eq!(feed.post(&post.id).unwrap().comments_count, 1);
        assert_eq!(h.backend.post(&post.id).unwrap().comments_count, 1);
        assert!(!feed.is_commenting(&post.id));
    }

    #[tokio::test]
    async fn committed_like_keeps_later_toggles_in_the_store() {
        let h = harness();
        let first = seed(&h, "uno", 0).await;
        h.clock.advance(Duration::minutes(1));
        let second = seed(&h, "dos", 0).await;
        let mut feed = loaded(&h).await;

        let commit = feed.toggle_like(&first.id).unwrap();
        feed.toggle_like(&second.id).unwrap();
        let outcome = commit.run(&h.ctx).await;
        feed.apply(outcome);

        let both: LikeSet = [first.id.clone(), second.id.clone()].into_iter().collect();
        assert_eq!(h.ctx.store.load::<LikeSet>(LIKES_KEY), Some(both));
        assert_eq!(
            h.backend.stored_likes("anon_viewer").unwrap().post_ids,
            vec![first.id.clone()]
        );
    }
}
