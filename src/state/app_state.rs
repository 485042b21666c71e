use sensor_feed::DashboardHandle;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardHandle,
}

impl AppState {
    pub fn new(dashboard: DashboardHandle) -> Self {
        Self { dashboard }
    }
}
