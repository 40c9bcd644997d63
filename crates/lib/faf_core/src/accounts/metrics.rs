//! Prometheus counters for lifecycle steps.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Steps of the registration funnel.
#[derive(Debug, Clone, Copy)]
pub enum RegistrationStep {
    Registration,
    Activation,
    SteamLinkRequested,
    SteamLinkDone,
}

impl RegistrationStep {
    fn as_str(self) -> &'static str {
        match self {
            RegistrationStep::Registration => "registration",
            RegistrationStep::Activation => "activation",
            RegistrationStep::SteamLinkRequested => "steamLinkRequested",
            RegistrationStep::SteamLinkDone => "steamLinkDone",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PasswordResetStep {
    Request,
    Done,
}

impl PasswordResetStep {
    fn as_str(self) -> &'static str {
        match self {
            PasswordResetStep::Request => "request",
            PasswordResetStep::Done => "done",
        }
    }
}

/// Counters registered on a dedicated registry.
#[derive(Clone)]
pub struct LifecycleMetrics {
    registry: Registry,
    registrations: IntCounterVec,
    name_changes: IntCounter,
    password_resets: IntCounterVec,
}

impl LifecycleMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let registrations = IntCounterVec::new(
            Opts::new("user_registrations_count", "Registration funnel steps"),
            &["step"],
        )?;
        let name_changes = IntCounter::new("user_name_change_count", "Login changes")?;
        let password_resets = IntCounterVec::new(
            Opts::new("user_password_reset_count", "Password reset steps"),
            &["step"],
        )?;

        registry.register(Box::new(registrations.clone()))?;
        registry.register(Box::new(name_changes.clone()))?;
        registry.register(Box::new(password_resets.clone()))?;

        Ok(Self {
            registry,
            registrations,
            name_changes,
            password_resets,
        })
    }

    pub fn registration_step(&self, step: RegistrationStep) {
        self.registrations.with_label_values(&[step.as_str()]).inc();
    }

    pub fn name_changed(&self) {
        self.name_changes.inc();
    }

    pub fn password_reset_step(&self, step: PasswordResetStep) {
        self.password_resets.with_label_values(&[step.as_str()]).inc();
    }

    pub fn registration_count(&self, step: RegistrationStep) -> u64 {
        self.registrations.with_label_values(&[step.as_str()]).get()
    }

    pub fn name_change_count(&self) -> u64 {
        self.name_changes.get()
    }

    pub fn password_reset_count(&self, step: PasswordResetStep) -> u64 {
        self.password_resets.with_label_values(&[step.as_str()]).get()
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent_per_step() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.registration_step(RegistrationStep::Registration);
        metrics.registration_step(RegistrationStep::Registration);
        metrics.registration_step(RegistrationStep::Activation);
        assert_eq!(metrics.registration_count(RegistrationStep::Registration), 2);
        assert_eq!(metrics.registration_count(RegistrationStep::Activation), 1);
        assert_eq!(metrics.registration_count(RegistrationStep::SteamLinkDone), 0);
    }

    #[test]
    fn render_exposes_counter_names() {
        let metrics = LifecycleMetrics::new().unwrap();
        metrics.name_changed();
        metrics.password_reset_step(PasswordResetStep::Request);
        let text = metrics.render().unwrap();
        assert!(text.contains("user_name_change_count 1"));
        assert!(text.contains("user_password_reset_count{step=\"request\"} 1"));
    }
}
