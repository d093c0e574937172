//! Route table for the site and the admin dashboard.

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/admin/login";

/// Where a successful login lands when no location was preserved.
pub const HOME_PATH: &str = "/";

/// Every page the site knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    About,
    Projects,
    Contact,
    Comments,
    Login,
    Dashboard,
    ManageComments,
    ManageExperience,
    ManageProjects,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Home,
        Route::About,
        Route::Projects,
        Route::Contact,
        Route::Comments,
        Route::Login,
        Route::Dashboard,
        Route::ManageComments,
        Route::ManageExperience,
        Route::ManageProjects,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => HOME_PATH,
            Route::About => "/about",
            Route::Projects => "/projects",
            Route::Contact => "/contact",
            Route::Comments => "/comments",
            Route::Login => LOGIN_PATH,
            Route::Dashboard => "/admin/dashboard",
            Route::ManageComments => "/admin/dashboard/manage-comments",
            Route::ManageExperience => "/admin/dashboard/manage-experience",
            Route::ManageProjects => "/admin/dashboard/manage-projects",
        }
    }

    /// Resolve a location (query string and trailing slash ignored).
    pub fn parse(location: &str) -> Option<Route> {
        let path = location.split(['?', '#']).next().unwrap_or("");
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        Route::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Dashboard pages sit behind the session gate.
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Route::Dashboard
                | Route::ManageComments
                | Route::ManageExperience
                | Route::ManageProjects
        )
    }
}

/// Only same-site absolute paths may be used as a post-login destination.
pub fn is_internal_path(location: &str) -> bool {
    location.starts_with('/') && !location.starts_with("//") && !location.contains('\\')
}
