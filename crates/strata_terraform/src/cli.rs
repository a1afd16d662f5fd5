use std::path::{Path, PathBuf};
use std::process::Stdio;
use strata_core::prelude::*;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

pub const PLAN_FILE: &str = "restore.tfplan";

/// Runs the `terraform` binary in a working directory, one blocking step at a time.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    program: String,
    leading_args: Vec<String>,
    working_dir: PathBuf,
}

impl TerraformCli {
    pub fn new(working_dir: impl Into<PathBuf>) -> Result<Self, ProvisioningError> {
        Self::with_program(working_dir, "terraform", Vec::new())
    }

    /// Use a different executable (e.g. `tofu`), optionally with arguments placed
    /// before every subcommand.
    pub fn with_program(
        working_dir: impl Into<PathBuf>,
        program: impl Into<String>,
        leading_args: Vec<String>,
    ) -> Result<Self, ProvisioningError> {
        let working_dir = working_dir.into();
        if !working_dir.is_dir() {
            return Err(ProvisioningError::DirectoryNotFound(working_dir));
        }
        Ok(Self {
            program: program.into(),
            leading_args,
            working_dir,
        })
    }

    #[instrument(skip(self), fields(dir = %self.working_dir.display()))]
    async fn run(&self, args: &[&str]) -> Result<ToolOutput, ProvisioningError> {
        debug!(program = %self.program, "Running subprocess");
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProvisioningError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let result = ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success() {
            warn!(status = ?result.status, "Subprocess failed");
        }
        Ok(result)
    }
}

impl ProvisioningTool for TerraformCli {
    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn init(&self) -> Result<ToolOutput, ProvisioningError> {
        info!("Initializing Terraform...");
        self.run(&["init", "-input=false"]).await
    }

    async fn plan(&self) -> Result<PlanArtifact, ProvisioningError> {
        info!("Running Terraform plan...");
        let out_arg = format!("-out={PLAN_FILE}");
        let output = self.run(&["plan", "-input=false", &out_arg]).await?;
        Ok(PlanArtifact {
            path: self.working_dir.join(PLAN_FILE),
            output,
        })
    }

    async fn apply(&self, plan: &PlanArtifact, auto_approve: bool) -> Result<ToolOutput, ProvisioningError> {
        info!("Applying Terraform changes...");
        let plan_arg = plan
            .path
            .strip_prefix(&self.working_dir)
            .unwrap_or(&plan.path)
            .to_string_lossy()
            .into_owned();

        let mut args = vec!["apply", "-input=false"];
        if auto_approve {
            args.push("-auto-approve");
        }
        args.push(&plan_arg);
        self.run(&args).await
    }

    async fn discard(&self, plan: PlanArtifact) -> Result<(), ProvisioningError> {
        match tokio::fs::remove_file(&plan.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProvisioningError::Io(e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const FAKE_TERRAFORM: &str = r#"
echo "$@" >> calls.log
case "$1" in
  plan) touch restore.tfplan ;;
  apply) [ -f restore.tfplan ] || exit 3 ;;
esac
exit 0
"#;

    fn fake_cli(dir: &Path) -> TerraformCli {
        let script = dir.join("fake-terraform.sh");
        std::fs::write(&script, FAKE_TERRAFORM).unwrap();
        TerraformCli::with_program(dir, "sh", vec![script.display().to_string()]).unwrap()
    }

    #[tokio::test]
    async fn runs_init_plan_apply_with_expected_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_cli(dir.path());

        assert!(cli.init().await.unwrap().success());
        let plan = cli.plan().await.unwrap();
        assert!(plan.output.success());
        assert!(plan.path.exists());

        let applied = cli.apply(&plan, true).await.unwrap();
        assert!(applied.success());
        cli.discard(plan.clone()).await.unwrap();
        assert!(!plan.path.exists());

        let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(
            calls,
            vec![
                "init -input=false",
                "plan -input=false -out=restore.tfplan",
                "apply -input=false -auto-approve restore.tfplan",
            ]
        );
    }

    #[tokio::test]
    async fn missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = TerraformCli::new(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ProvisioningError::DirectoryNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = TerraformCli::with_program(dir.path(), "definitely-not-terraform-xyz", Vec::new())
            .unwrap();
        assert!(matches!(
            cli.init().await,
            Err(ProvisioningError::Spawn { .. })
        ));
    }
}
