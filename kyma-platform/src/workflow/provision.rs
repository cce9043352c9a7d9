//! GCP cluster provisioning workflow

use kyma_core::domain::cluster::{
    ClusterDescriptor, ClusterSpec, ClusterState, ProviderSpec, ProviderType,
};
use kyma_core::{ExternalError, PipelineError, StepFactory, StepPipeline, ValidationError};
use std::path::PathBuf;
use tracing::info;

use crate::kubeconfig::KubeconfigWriter;
use crate::provider::Provisioner;
use crate::state::ClusterStateStore;

pub const STEP_PROVISION: &str = "Provisioning GCP cluster";
pub const STEP_SAVE_STATE: &str = "Saving cluster state";
pub const STEP_CREDENTIALS: &str = "Fetching cluster credentials";
pub const STEP_KUBECONFIG: &str = "Importing kubeconfig";

/// Flag values of `provision gcp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpOptions {
    pub name: Option<String>,
    pub project: Option<String>,
    pub credentials: Option<PathBuf>,
    pub kubernetes_version: String,
    pub location: String,
    pub machine_type: String,
    pub disk_size_gb: u32,
    pub node_count: u32,
    /// Raw `NAME=VALUE` pairs
    pub extras: Vec<String>,
}

impl Default for GcpOptions {
    fn default() -> Self {
        Self {
            name: None,
            project: None,
            credentials: None,
            kubernetes_version: "1.14".to_string(),
            location: "europe-west3-a".to_string(),
            machine_type: "n1-standard-4".to_string(),
            disk_size_gb: 30,
            node_count: 3,
            extras: Vec::new(),
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

impl GcpOptions {
    /// Checks the required flags, reporting every missing one at once
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if is_blank(self.name.as_deref()) {
            missing.push("name");
        }
        if is_blank(self.project.as_deref()) {
            missing.push("project");
        }
        if self
            .credentials
            .as_ref()
            .is_none_or(|path| path.as_os_str().is_empty())
        {
            missing.push("credentials");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFlags(missing))
        }
    }

    pub fn cluster_spec(&self) -> Result<ClusterSpec, ValidationError> {
        self.validate()?;
        Ok(ClusterSpec {
            name: self.name.clone().unwrap_or_default(),
            kubernetes_version: self.kubernetes_version.clone(),
            location: self.location.clone(),
            machine_type: self.machine_type.clone(),
            disk_size_gb: self.disk_size_gb,
            node_count: self.node_count,
        })
    }

    pub fn provider_spec(&self) -> Result<ProviderSpec, ValidationError> {
        self.validate()?;
        ProviderSpec::new(
            ProviderType::Gcp,
            self.project.clone().unwrap_or_default(),
            self.credentials.clone().unwrap_or_default(),
        )
        .with_extras(&self.extras)
    }
}

/// External systems the provisioning workflow talks to
pub struct ProvisionCollaborators<'a> {
    pub provisioner: &'a dyn Provisioner,
    pub state_store: &'a dyn ClusterStateStore,
    pub kubeconfig: &'a dyn KubeconfigWriter,
}

/// Provisions a GKE cluster and points kubectl at it
///
/// Inputs are validated and turned into specs before the first step starts.
/// The steps then run strictly in order and the first failure aborts the
/// workflow. Nothing is rolled back: a cluster that was created but not
/// recorded stays behind.
///
/// # Returns
/// The provisioned cluster
pub fn provision_gcp<F: StepFactory>(
    pipeline: &mut StepPipeline<F>,
    options: &GcpOptions,
    collaborators: &ProvisionCollaborators<'_>,
) -> Result<ClusterDescriptor, PipelineError> {
    options.validate()?;
    let cluster_spec = options.cluster_spec()?;
    let provider_spec = options.provider_spec()?;

    let cluster = pipeline.run(STEP_PROVISION, |step| {
        let cluster = collaborators
            .provisioner
            .provision(&cluster_spec, &provider_spec)?;
        if let Some(endpoint) = &cluster.endpoint {
            step.info(&format!("API server endpoint: {}", endpoint));
        }
        step.status(&format!("Cluster {} created", cluster.name));
        step.succeed();
        Ok::<_, ExternalError>(cluster)
    })?;

    pipeline.run(STEP_SAVE_STATE, |step| {
        let state = ClusterState::new(cluster.clone(), provider_spec.clone());
        collaborators.state_store.save(&state)?;
        step.succeed();
        Ok::<_, ExternalError>(())
    })?;

    let kubeconfig = pipeline.run(STEP_CREDENTIALS, |step| {
        let kubeconfig = collaborators
            .provisioner
            .credentials(&cluster, &provider_spec)?;
        step.succeed();
        Ok::<_, ExternalError>(kubeconfig)
    })?;

    pipeline.run(STEP_KUBECONFIG, |step| {
        collaborators.kubeconfig.append(&kubeconfig)?;
        step.succeed();
        Ok::<_, ExternalError>(())
    })?;

    info!("GCP cluster {} is ready", cluster.name);
    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyma_core::Step;
    use kyma_core::step::RecordingFactory;
    use std::cell::RefCell;

    /// Records every collaborator call and fails the configured one
    #[derive(Default)]
    struct FakeCloud {
        calls: RefCell<Vec<&'static str>>,
        fail_on: Option<&'static str>,
        saved: RefCell<Vec<ClusterState>>,
        provisioned_with: RefCell<Option<(ClusterSpec, ProviderSpec)>>,
    }

    impl FakeCloud {
        fn failing_on(call: &'static str) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::default()
            }
        }

        fn call(&self, name: &'static str) -> Result<(), ExternalError> {
            self.calls.borrow_mut().push(name);
            if self.fail_on == Some(name) {
                return Err(ExternalError::Command {
                    program: "gcloud".to_string(),
                    code: 1,
                    stderr: format!("{} failed", name),
                });
            }
            Ok(())
        }

        fn collaborators(&self) -> ProvisionCollaborators<'_> {
            ProvisionCollaborators {
                provisioner: self,
                state_store: self,
                kubeconfig: self,
            }
        }
    }

    impl Provisioner for FakeCloud {
        fn provision(
            &self,
            cluster: &ClusterSpec,
            provider: &ProviderSpec,
        ) -> Result<ClusterDescriptor, ExternalError> {
            self.call("provision")?;
            *self.provisioned_with.borrow_mut() = Some((cluster.clone(), provider.clone()));
            Ok(ClusterDescriptor {
                name: cluster.name.clone(),
                location: cluster.location.clone(),
                endpoint: Some("35.1.2.3".to_string()),
                status: Some("RUNNING".to_string()),
                provisioned_at: chrono::Utc::now(),
            })
        }

        fn credentials(
            &self,
            _cluster: &ClusterDescriptor,
            _provider: &ProviderSpec,
        ) -> Result<String, ExternalError> {
            self.call("credentials")?;
            Ok("apiVersion: v1\nkind: Config\n".to_string())
        }
    }

    impl ClusterStateStore for FakeCloud {
        fn save(&self, state: &ClusterState) -> Result<(), ExternalError> {
            self.call("save")?;
            self.saved.borrow_mut().push(state.clone());
            Ok(())
        }
    }

    impl KubeconfigWriter for FakeCloud {
        fn append(&self, _kubeconfig: &str) -> Result<(), ExternalError> {
            self.call("append")
        }
    }

    fn options() -> GcpOptions {
        GcpOptions {
            name: Some("kyma".to_string()),
            project: Some("my-project".to_string()),
            credentials: Some(PathBuf::from("/tmp/key.json")),
            ..GcpOptions::default()
        }
    }

    #[test]
    fn test_validate_reports_all_missing_flags() {
        let err = GcpOptions::default().validate().unwrap_err();

        assert_eq!(
            err,
            ValidationError::MissingFlags(vec!["name", "project", "credentials"])
        );
        let message = err.to_string();
        assert!(message.contains("`name`"));
        assert!(message.contains("`project`"));
        assert!(message.contains("`credentials`"));
    }

    #[test]
    fn test_validate_treats_blank_as_missing() {
        let options = GcpOptions {
            project: Some("  ".to_string()),
            ..options()
        };
        assert_eq!(
            options.validate().unwrap_err(),
            ValidationError::MissingFlags(vec!["project"])
        );
    }

    #[test]
    fn test_specs_use_defaults() {
        let cluster = options().cluster_spec().unwrap();
        assert_eq!(cluster.kubernetes_version, "1.14");
        assert_eq!(cluster.location, "europe-west3-a");
        assert_eq!(cluster.machine_type, "n1-standard-4");
        assert_eq!(cluster.disk_size_gb, 30);
        assert_eq!(cluster.node_count, 3);

        let provider = options().provider_spec().unwrap();
        assert_eq!(provider.provider_type, ProviderType::Gcp);
        assert!(provider.custom_configurations.is_empty());
    }

    #[test]
    fn test_runs_all_steps_in_order() {
        let cloud = FakeCloud::default();
        let mut pipeline = StepPipeline::new(RecordingFactory::new());
        let options = GcpOptions {
            extras: vec!["enable-autoupgrade=true".to_string()],
            ..options()
        };

        let cluster = provision_gcp(&mut pipeline, &options, &cloud.collaborators()).unwrap();

        assert_eq!(cluster.name, "kyma");
        assert_eq!(
            *cloud.calls.borrow(),
            ["provision", "save", "credentials", "append"]
        );
        assert_eq!(
            pipeline.factory().descriptions(),
            [STEP_PROVISION, STEP_SAVE_STATE, STEP_CREDENTIALS, STEP_KUBECONFIG]
        );
        assert!(pipeline.factory().steps().iter().all(|step| step.is_successful()));

        let saved = cloud.saved.borrow();
        assert_eq!(saved[0].cluster, cluster);
        assert_eq!(saved[0].provider.project, "my-project");

        let provisioned = cloud.provisioned_with.borrow();
        let (_, provider) = provisioned.as_ref().unwrap();
        assert_eq!(
            provider.custom_configurations.get("enable-autoupgrade").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_missing_flags_start_no_step() {
        let cloud = FakeCloud::default();
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        let err = provision_gcp(&mut pipeline, &GcpOptions::default(), &cloud.collaborators())
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("`credentials`"));
        assert!(pipeline.factory().steps().is_empty());
        assert!(cloud.calls.borrow().is_empty());
    }

    #[test]
    fn test_malformed_extra_starts_no_step() {
        let cloud = FakeCloud::default();
        let mut pipeline = StepPipeline::new(RecordingFactory::new());
        let options = GcpOptions {
            extras: vec!["good=1".to_string(), "bad".to_string()],
            ..options()
        };

        let err = provision_gcp(&mut pipeline, &options, &cloud.collaborators()).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MalformedExtra(ref extra)) if extra == "bad"
        ));
        assert!(pipeline.factory().steps().is_empty());
    }

    #[test]
    fn test_provision_failure_stops_pipeline() {
        let cloud = FakeCloud::failing_on("provision");
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        let err = provision_gcp(&mut pipeline, &options(), &cloud.collaborators()).unwrap_err();

        assert_eq!(err.step(), Some(STEP_PROVISION));
        assert_eq!(*cloud.calls.borrow(), ["provision"]);
        assert_eq!(pipeline.factory().descriptions(), [STEP_PROVISION]);

        let step = pipeline.factory().step(STEP_PROVISION).unwrap();
        assert!(!step.is_successful());
        assert!(step.statuses().is_empty());
        assert!(cloud.saved.borrow().is_empty());
    }

    #[test]
    fn test_state_failure_skips_credentials() {
        let cloud = FakeCloud::failing_on("save");
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        let err = provision_gcp(&mut pipeline, &options(), &cloud.collaborators()).unwrap_err();

        assert_eq!(err.step(), Some(STEP_SAVE_STATE));
        assert_eq!(*cloud.calls.borrow(), ["provision", "save"]);
        assert!(pipeline.factory().step(STEP_PROVISION).unwrap().is_successful());
        assert!(pipeline.factory().step(STEP_CREDENTIALS).is_none());
    }

    #[test]
    fn test_kubeconfig_failure_is_reported() {
        let cloud = FakeCloud::failing_on("append");
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        let err = provision_gcp(&mut pipeline, &options(), &cloud.collaborators()).unwrap_err();

        assert_eq!(err.step(), Some(STEP_KUBECONFIG));
        assert!(err.to_string().starts_with("Importing kubeconfig: "));
        assert_eq!(pipeline.completed(), [STEP_PROVISION, STEP_SAVE_STATE, STEP_CREDENTIALS]);
    }
}
