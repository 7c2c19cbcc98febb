/// Route table for the REST API. Handlers are mounted with these paths so
/// the SPA and the router agree on one list.
pub struct ApiUrls;

impl ApiUrls {
    pub const HEALTH: &'static str = "/health";
    pub const API_HEALTH: &'static str = "/api/health";
    pub const CLIENT_ERRORS: &'static str = "/api/client-errors";

    pub const AUTH_LOGIN: &'static str = "/api/auth/login";
    pub const AUTH_ME: &'static str = "/api/auth/me";
    pub const AUTH_PASSWORD: &'static str = "/api/auth/password";

    pub const USERS: &'static str = "/api/users";
    pub const USER_DIRECTORY: &'static str = "/api/users/directory";
    pub const USER_BY_ID: &'static str = "/api/users/:id";
    pub const USER_RESET_PASSWORD: &'static str = "/api/users/:id/reset-password";

    pub const ROLES: &'static str = "/api/roles";
    pub const ROLE_BY_ID: &'static str = "/api/roles/:id";
    pub const PERMISSIONS: &'static str = "/api/permissions";

    pub const PROJECTS: &'static str = "/api/projects";
    pub const PROJECT_BY_ID: &'static str = "/api/projects/:id";

    pub const JOBS: &'static str = "/api/jobs";
    pub const JOB_BY_ID: &'static str = "/api/jobs/:id";
    pub const JOB_STATUS: &'static str = "/api/jobs/:id/status";

    pub const PAYMENTS: &'static str = "/api/finance/payments";
    pub const PAYMENT_BY_ID: &'static str = "/api/finance/payments/:id";
    pub const PAYMENT_APPROVE: &'static str = "/api/finance/payments/:id/approve";
    pub const PAYMENT_REJECT: &'static str = "/api/finance/payments/:id/reject";

    pub const ACCOUNT_HEADS: &'static str = "/api/finance/account-heads";
    pub const ACCOUNT_HEAD_BY_ID: &'static str = "/api/finance/account-heads/:id";
    pub const ACCOUNT_HEAD_APPROVE: &'static str = "/api/finance/account-heads/:id/approve";
    pub const ACCOUNT_HEAD_REJECT: &'static str = "/api/finance/account-heads/:id/reject";
    pub const ACCOUNT_HEAD_STATUS: &'static str = "/api/finance/account-heads/:id/status";

    pub const COLLECTIONS: &'static str = "/api/finance/collections";
    pub const COLLECTION_BY_ID: &'static str = "/api/finance/collections/:id";

    pub const DEPOSITS: &'static str = "/api/finance/deposits";
    pub const DEPOSIT_BY_ID: &'static str = "/api/finance/deposits/:id";

    pub const FINANCE_SUMMARY: &'static str = "/api/finance/summary";

    pub const THREADS: &'static str = "/api/threads";
    pub const THREAD_BY_ID: &'static str = "/api/threads/:id";
    pub const THREAD_MESSAGES: &'static str = "/api/threads/:id/messages";
    pub const THREAD_READ: &'static str = "/api/threads/:id/read";
    pub const THREAD_PARTICIPANTS: &'static str = "/api/threads/:id/participants";
    pub const THREAD_SUMMARY: &'static str = "/api/threads/:id/summary";

    pub const TASKS: &'static str = "/api/tasks";
    pub const TASK_BY_ID: &'static str = "/api/tasks/:id";
    pub const TASK_STATUS: &'static str = "/api/tasks/:id/status";

    pub const ANNOUNCEMENTS: &'static str = "/api/announcements";
    pub const ANNOUNCEMENT_BY_ID: &'static str = "/api/announcements/:id";

    pub const DASHBOARD_SUMMARY: &'static str = "/api/dashboard/summary";
}
