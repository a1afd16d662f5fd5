use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_core::prelude::*;

#[derive(Default)]
struct Script {
    init_status: i32,
    plan_status: i32,
    apply_status: i32,
    calls: Vec<String>,
}

/// Provisioning tool that returns scripted exit codes and records its calls.
#[derive(Clone)]
pub struct ScriptedProvisioner {
    working_dir: PathBuf,
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvisioner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn failing_init(self, status: i32) -> Self {
        self.lock().init_status = status;
        self
    }

    pub fn failing_plan(self, status: i32) -> Self {
        self.lock().plan_status = status;
        self
    }

    pub fn failing_apply(self, status: i32) -> Self {
        self.lock().apply_status = status;
        self
    }

    /// e.g. `["init", "plan", "apply -auto-approve", "discard"]`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.lock().calls.push(call.into());
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn output(status: i32, step: &str) -> ToolOutput {
    ToolOutput {
        status: Some(status),
        stdout: format!("{step} finished"),
        stderr: if status == 0 {
            String::new()
        } else {
            format!("{step} failed")
        },
    }
}

impl ProvisioningTool for ScriptedProvisioner {
    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn init(&self) -> Result<ToolOutput, ProvisioningError> {
        self.record("init");
        Ok(output(self.lock().init_status, "init"))
    }

    async fn plan(&self) -> Result<PlanArtifact, ProvisioningError> {
        self.record("plan");
        Ok(PlanArtifact {
            path: self.working_dir.join("restore.tfplan"),
            output: output(self.lock().plan_status, "plan"),
        })
    }

    async fn apply(&self, _plan: &PlanArtifact, auto_approve: bool) -> Result<ToolOutput, ProvisioningError> {
        self.record(if auto_approve { "apply -auto-approve" } else { "apply" });
        Ok(output(self.lock().apply_status, "apply"))
    }

    async fn discard(&self, _plan: PlanArtifact) -> Result<(), ProvisioningError> {
        self.record("discard");
        Ok(())
    }
}
