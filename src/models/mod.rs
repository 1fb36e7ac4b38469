pub mod avatar;
pub mod backend;
pub mod clock;
pub mod comment;
pub mod config;
pub mod identity;
pub mod likes;
pub mod notifications;
pub mod post;
pub mod realtime;
pub mod storage;
pub mod supabase;
pub mod user;

// Re-export important structs for convenience
pub use backend::{Backend, MemoryBackend};
pub use comment::{Comment, NewComment};
pub use config::Config;
pub use likes::LikeSet;
pub use post::{NewPost, Post};
pub use storage::LocalStore;
pub use supabase::SupabaseClient;
pub use user::AnonymousUser;
