pub mod directory;
pub use self::directory::*;

pub mod operations;
pub use self::operations::*;

pub mod finance;
pub use self::finance::*;

pub mod messaging;
pub use self::messaging::*;

diesel::joinable!(users -> roles (role_id));
diesel::joinable!(service_jobs -> projects (project_id));
diesel::joinable!(tasks -> projects (project_id));
diesel::joinable!(payment_instructions -> account_heads (account_head_id));
diesel::joinable!(deposits -> account_heads (account_head_id));
diesel::joinable!(thread_participants -> threads (thread_id));
diesel::joinable!(thread_participants -> users (user_id));
diesel::joinable!(messages -> threads (thread_id));

diesel::allow_tables_to_appear_in_same_query!(
    roles,
    users,
    projects,
    service_jobs,
    tasks,
    announcements,
    account_heads,
    payment_instructions,
    collections,
    deposits,
    threads,
    thread_participants,
    messages,
);
