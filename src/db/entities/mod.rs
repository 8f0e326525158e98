//! One `sea_orm` entity module per table named in §6.2. Each is a plain
//! `Model`/`ActiveModel` pair (`DeriveEntityModel`); cross-table logic lives
//! in `repo_ops`/`dispatch`/`checks` as hand-written queries rather than
//! `Related<>` relation traversal, since no usage example for this crate
//! exists anywhere in the retrieved pack to verify relation-macro wiring
//! against (see DESIGN.md).

pub mod blob;
pub mod commit;
pub mod pull_request;
pub mod pull_request_comment;
pub mod r#ref;
pub mod repository;
pub mod stage;
pub mod stage_file;
pub mod stage_log_line;
pub mod stage_run;
pub mod staging_file;
pub mod tree;
pub mod tree_entry;
