//! Static catalog of Buildkite pipeline knowledge
//!
//! Closed tables for top-level properties, step properties, property
//! documentation, popular plugins, plugin completion snippets, and
//! step-type signatures. These tables are the only source of truth for
//! closed-set suggestions.

/// How a catalog entry should be presented in completion lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Property,
    Keyword,
}

/// A property in one of the closed completion sets.
#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: ItemKind,
    pub detail: &'static str,
    pub doc: &'static str,
    /// Insertion snippet with tabstops, when a scaffold is useful
    pub snippet: Option<&'static str>,
}

/// Top-level pipeline properties.
pub const TOP_LEVEL_PROPERTIES: &[PropertySpec] = &[
    PropertySpec {
        name: "steps",
        kind: ItemKind::Property,
        detail: "Pipeline steps array",
        doc: "An array of build steps to be run",
        snippet: Some("steps:\n  - $0"),
    },
    PropertySpec {
        name: "env",
        kind: ItemKind::Property,
        detail: "Environment variables",
        doc: "Environment variables for the pipeline",
        snippet: Some("env:\n  $0"),
    },
    PropertySpec {
        name: "agents",
        kind: ItemKind::Property,
        detail: "Agent requirements",
        doc: "Requirements for agents to run this pipeline",
        snippet: Some("agents:\n  $0"),
    },
    PropertySpec {
        name: "timeout_in_minutes",
        kind: ItemKind::Property,
        detail: "Pipeline timeout",
        doc: "The maximum number of minutes a job created by this step will run",
        snippet: None,
    },
    PropertySpec {
        name: "cancel_running_branch_builds",
        kind: ItemKind::Property,
        detail: "Cancel running builds",
        doc: "Cancel running builds for the same branch when a new build is created",
        snippet: None,
    },
    PropertySpec {
        name: "skip_intermediate_builds",
        kind: ItemKind::Property,
        detail: "Skip intermediate builds",
        doc: "Skip intermediate builds and only run the latest",
        snippet: None,
    },
    PropertySpec {
        name: "skip",
        kind: ItemKind::Property,
        detail: "Skip entire pipeline",
        doc: "Skip this pipeline entirely",
        snippet: None,
    },
    PropertySpec {
        name: "notify",
        kind: ItemKind::Property,
        detail: "Build notifications",
        doc: "Configure Slack, email, or webhook notifications",
        snippet: Some("notify:\n  - ${1|slack,email,webhook|}: \"$2\""),
    },
    PropertySpec {
        name: "group",
        kind: ItemKind::Property,
        detail: "Group steps together",
        doc: "Group related steps together in the pipeline UI",
        snippet: Some("group: \"$1\""),
    },
    PropertySpec {
        name: "x-buildkite-repository-provider",
        kind: ItemKind::Property,
        detail: "Repository provider settings",
        doc: "Configure repository provider specific settings",
        snippet: Some(
            "x-buildkite-repository-provider:\n  webhook_url: \"${1:https://api.buildkite.com/v2/webhooks/}\"\n  build_branches: ${2|true,false|}",
        ),
    },
    PropertySpec {
        name: "x-buildkite-plugins",
        kind: ItemKind::Property,
        detail: "Global plugin configuration",
        doc: "Define plugins that apply to all steps",
        snippet: Some(
            "x-buildkite-plugins:\n  - ${1:plugin-name}#${2:version}:\n      ${3:config}: \"${4:value}\"",
        ),
    },
    PropertySpec {
        name: "repository_provider_settings",
        kind: ItemKind::Property,
        detail: "Repository provider configuration",
        doc: "Settings specific to your repository provider (GitHub, GitLab, etc.)",
        snippet: Some(
            "repository_provider_settings:\n  build_pull_requests: ${1|true,false|}\n  build_branches: ${2|true,false|}\n  publish_commit_status: ${3|true,false|}",
        ),
    },
];

/// Step properties, including the step-type keywords.
pub const STEP_PROPERTIES: &[PropertySpec] = &[
    PropertySpec {
        name: "label",
        kind: ItemKind::Property,
        detail: "Step label",
        doc: "The label that will be displayed in the pipeline",
        snippet: None,
    },
    PropertySpec {
        name: "command",
        kind: ItemKind::Property,
        detail: "Command to run",
        doc: "The command/script to be executed by this step",
        snippet: None,
    },
    PropertySpec {
        name: "commands",
        kind: ItemKind::Property,
        detail: "Multiple commands",
        doc: "An array of commands to run in sequence",
        snippet: Some("commands:\n  - \"$0\""),
    },
    PropertySpec {
        name: "agents",
        kind: ItemKind::Property,
        detail: "Agent requirements for step",
        doc: "Agent query rules to target specific agents",
        snippet: Some("agents:\n  $0"),
    },
    PropertySpec {
        name: "artifact_paths",
        kind: ItemKind::Property,
        detail: "Paths to upload as artifacts",
        doc: "Glob patterns for files to upload as build artifacts",
        snippet: None,
    },
    PropertySpec {
        name: "branches",
        kind: ItemKind::Property,
        detail: "Branch filtering",
        doc: "Restrict step to certain branches",
        snippet: None,
    },
    PropertySpec {
        name: "if",
        kind: ItemKind::Property,
        detail: "Conditional step",
        doc: "A boolean condition to determine if the step should run",
        snippet: None,
    },
    PropertySpec {
        name: "depends_on",
        kind: ItemKind::Property,
        detail: "Step dependencies",
        doc: "A list of step keys that this step depends on",
        snippet: None,
    },
    PropertySpec {
        name: "retry",
        kind: ItemKind::Property,
        detail: "Retry configuration",
        doc: "The conditions for retrying this step",
        snippet: Some("retry:\n  automatic: ${1:true}\n  manual: ${2:true}"),
    },
    PropertySpec {
        name: "timeout_in_minutes",
        kind: ItemKind::Property,
        detail: "Step timeout",
        doc: "The number of minutes to time out a job",
        snippet: None,
    },
    PropertySpec {
        name: "skip",
        kind: ItemKind::Property,
        detail: "Skip this step",
        doc: "Whether to skip this step",
        snippet: None,
    },
    PropertySpec {
        name: "plugins",
        kind: ItemKind::Property,
        detail: "Build step plugins",
        doc: "List of plugins to run for this step",
        snippet: Some("plugins:\n  - $0"),
    },
    PropertySpec {
        name: "key",
        kind: ItemKind::Property,
        detail: "Step key identifier",
        doc: "A unique identifier for this step, used for dependencies",
        snippet: None,
    },
    PropertySpec {
        name: "concurrency",
        kind: ItemKind::Property,
        detail: "Concurrency limit",
        doc: "Number of concurrent jobs allowed for this step",
        snippet: None,
    },
    PropertySpec {
        name: "concurrency_group",
        kind: ItemKind::Property,
        detail: "Concurrency group name",
        doc: "Name of the concurrency group to limit parallel execution",
        snippet: None,
    },
    PropertySpec {
        name: "concurrency_method",
        kind: ItemKind::Property,
        detail: "Concurrency method",
        doc: "How to handle concurrency limits (eager or ordered)",
        snippet: Some("concurrency_method: ${1|eager,ordered|}"),
    },
    PropertySpec {
        name: "parallelism",
        kind: ItemKind::Property,
        detail: "Number of parallel jobs",
        doc: "Number of parallel jobs to run for this step",
        snippet: Some("parallelism: ${1:5}"),
    },
    PropertySpec {
        name: "soft_fail",
        kind: ItemKind::Property,
        detail: "Allow step to fail",
        doc: "Allow the step to fail without failing the entire build",
        snippet: Some("soft_fail: ${1|true,false|}"),
    },
    PropertySpec {
        name: "priority",
        kind: ItemKind::Property,
        detail: "Step priority",
        doc: "Priority of this step (-5 to 5, higher values run first)",
        snippet: None,
    },
    PropertySpec {
        name: "matrix",
        kind: ItemKind::Property,
        detail: "Matrix build configuration",
        doc: "Create multiple variations of this step with different variable combinations",
        snippet: Some(
            "matrix:\n  setup:\n    ${1:environment}: [\"${2:production}\", \"${3:staging}\"]\n    ${4:node_version}: [\"${5:16}\", \"${6:18}\", \"${7:20}\"]\n  adjustments:\n    - with:\n        ${8:environment}: \"${9:production}\"\n      ${10|skip,soft_fail|}: ${11|true,false|}",
        ),
    },
    PropertySpec {
        name: "notify",
        kind: ItemKind::Property,
        detail: "Step-specific notifications",
        doc: "Configure notifications for this specific step",
        snippet: Some("notify:\n  - ${1|slack,email,webhook|}: \"$2\""),
    },
    PropertySpec {
        name: "wait",
        kind: ItemKind::Keyword,
        detail: "Wait step",
        doc: "Wait for all previous steps to complete",
        snippet: Some("wait: ${1|~,null|}"),
    },
    PropertySpec {
        name: "block",
        kind: ItemKind::Keyword,
        detail: "Block/manual step",
        doc: "Manual approval step that blocks pipeline execution",
        snippet: None,
    },
    PropertySpec {
        name: "input",
        kind: ItemKind::Keyword,
        detail: "Input step",
        doc: "Collect user input before continuing",
        snippet: None,
    },
    PropertySpec {
        name: "trigger",
        kind: ItemKind::Keyword,
        detail: "Trigger step",
        doc: "Trigger another pipeline",
        snippet: None,
    },
    PropertySpec {
        name: "group",
        kind: ItemKind::Property,
        detail: "Group step",
        doc: "Group multiple steps together",
        snippet: Some("group: \"$1\"\nsteps:\n  - $0"),
    },
    PropertySpec {
        name: "prompt",
        kind: ItemKind::Property,
        detail: "Block step prompt",
        doc: "Prompt text shown for manual approval steps",
        snippet: None,
    },
    PropertySpec {
        name: "fields",
        kind: ItemKind::Property,
        detail: "Input step fields",
        doc: "Fields to collect from user input",
        snippet: Some("fields:\n  - ${1|text,select,boolean|}: \"$2\""),
    },
    PropertySpec {
        name: "pipeline",
        kind: ItemKind::Property,
        detail: "Pipeline to trigger",
        doc: "Pipeline slug to trigger",
        snippet: None,
    },
    PropertySpec {
        name: "build",
        kind: ItemKind::Property,
        detail: "Trigger build configuration",
        doc: "Build configuration for triggered pipeline",
        snippet: Some("build:\n  message: \"$1\"\n  commit: \"${2:HEAD}\"\n  branch: \"${3:main}\""),
    },
    PropertySpec {
        name: "async",
        kind: ItemKind::Property,
        detail: "Async trigger",
        doc: "Don't wait for triggered pipeline to complete",
        snippet: None,
    },
    PropertySpec {
        name: "signature",
        kind: ItemKind::Property,
        detail: "Step signature",
        doc: "Digital signature for step verification",
        snippet: Some(
            "signature:\n  algorithm: \"${1:sha256}\"\n  signed_fields:\n    - \"${2:command}\"",
        ),
    },
    PropertySpec {
        name: "cache",
        kind: ItemKind::Property,
        detail: "Step-level cache",
        doc: "Cache configuration for this specific step",
        snippet: Some("cache:\n  - \"${1:.cache}\""),
    },
    PropertySpec {
        name: "cancel_on_build_failing",
        kind: ItemKind::Property,
        detail: "Cancel on build failure",
        doc: "Cancel this step if any other step fails",
        snippet: Some("cancel_on_build_failing: ${1|true,false|}"),
    },
];

/// A commonly used plugin with its latest version.
#[derive(Debug, Clone, Copy)]
pub struct PopularPlugin {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// The most commonly used Buildkite plugins.
pub const POPULAR_PLUGINS: &[PopularPlugin] = &[
    PopularPlugin {
        name: "docker",
        version: "v5.13.0",
        description: "Run build steps in Docker containers",
    },
    PopularPlugin {
        name: "docker-compose",
        version: "v5.10.0",
        description: "Run build steps with Docker Compose",
    },
    PopularPlugin {
        name: "cache",
        version: "v1.7.0",
        description: "Cache files between builds",
    },
    PopularPlugin {
        name: "artifacts",
        version: "v1.9.4",
        description: "Upload and download build artifacts",
    },
    PopularPlugin {
        name: "test-collector",
        version: "v1.11.0",
        description: "Collect and analyze test results",
    },
    PopularPlugin {
        name: "junit-annotate",
        version: "v2.7.0",
        description: "Annotate builds with JUnit test results",
    },
    PopularPlugin {
        name: "shellcheck",
        version: "v1.4.0",
        description: "Run ShellCheck on shell scripts",
    },
    PopularPlugin {
        name: "ecr",
        version: "v2.10.0",
        description: "Build and push Docker images to AWS ECR",
    },
    PopularPlugin {
        name: "monorepo-diff",
        version: "v1.5.1",
        description: "Skip builds for unchanged parts of monorepos",
    },
    PopularPlugin {
        name: "plugin-linter",
        version: "v3.3.0",
        description: "Lint Buildkite plugins",
    },
    PopularPlugin {
        name: "docker-login",
        version: "v3.0.0",
        description: "Log in to Docker registries",
    },
];

/// Configuration snippet body for a plugin, inserted after
/// `<name>#<version>:` in a plugins list. Tabstops point at the option
/// users most commonly set first.
pub fn plugin_config_snippet(name: &str) -> &'static str {
    match name {
        "docker" => "image: \"${1:node:18}\"",
        "docker-compose" => "run: \"${1:app}\"",
        "cache" => "key: \"${1:v1-cache-key}\"\n    paths:\n      - \"${2:.cache}\"",
        "artifacts" => "download: \"${1:build/*}\"",
        "test-collector" => "files: \"${1:test-results.xml}\"",
        "slack" => "message: \"${1:Build completed}\"",
        "junit-annotate" => "artifacts: \"${1:test-results.xml}\"",
        "shellcheck" => "files: \"${1:scripts/*.sh}\"",
        _ => "${1:property}: \"${2:value}\"",
    }
}

/// Markdown documentation for a pipeline or step property.
pub fn property_documentation(property: &str) -> Option<&'static str> {
    let doc = match property {
        // Pipeline-level properties
        "steps" => "**steps** - Array of build steps to be executed\n\nDefines the sequence of operations for your build pipeline. Each step can be a command step, wait step, block step, input step, or trigger step.\n\n[Steps Documentation](https://buildkite.com/docs/pipelines/defining-steps)",
        "env" => "**env** - Environment variables for the pipeline\n\nDefines environment variables that will be available to all steps in the pipeline unless overridden at the step level.\n\nExample:\n```yaml\nenv:\n  NODE_ENV: production\n  DEBUG: \"false\"\n```",
        "agents" => "**agents** - Agent requirements for running steps\n\nSpecifies which agents can run this pipeline or step using key-value pairs for targeting.\n\nExample:\n```yaml\nagents:\n  queue: \"default\"\n  os: \"linux\"\n```",

        // Step properties
        "label" => "**label** - Human-readable name for the step\n\nDisplayed in the Buildkite UI and used to identify the step. Supports emoji and can include environment variable substitutions.\n\nExample: `label: \":rocket: Deploy to production\"`",
        "command" => "**command** - Shell command(s) to execute\n\nCan be a single command or multiple commands. Supports multiline YAML syntax for complex scripts.\n\nExample:\n```yaml\ncommand: |\n  echo \"Building...\"\n  make build\n  make test\n```",
        "plugins" => "**plugins** - List of plugins to enhance the step\n\nEach plugin provides additional functionality like Docker support, caching, or artifact management. Plugins are specified with their name and version.\n\n[Plugin Directory](https://buildkite.com/plugins)",

        // Advanced step properties
        "depends_on" => "**depends_on** - Step dependencies\n\nSpecifies which steps must complete before this step runs. Can reference steps by label or use step keys.\n\nExample:\n```yaml\ndepends_on:\n  - \"build\"\n  - step: \"test\"\n    allow_failure: true\n```",
        "if" => "**if** - Conditional execution\n\nStep will only run if the condition evaluates to true. Supports environment variables and build metadata.\n\nExample: `if: build.branch == \"main\"`",
        "retry" => "**retry** - Automatic and manual retry configuration\n\nDefines how the step should be retried on failure.\n\nExample:\n```yaml\nretry:\n  automatic:\n    - exit_status: -1\n      limit: 2\n  manual:\n    allowed: true\n```",
        "timeout_in_minutes" => "**timeout_in_minutes** - Step timeout\n\nMaximum time the step can run before being cancelled. Defaults to no timeout.\n\nExample: `timeout_in_minutes: 30`",
        "artifact_paths" => "**artifact_paths** - Glob patterns for build artifacts\n\nSpecifies which files/directories to upload as build artifacts after the step completes.\n\nExample: `artifact_paths: \"dist/**/*\"`",
        "branches" => "**branches** - Branch filtering\n\nControls which branches this step runs on. Supports glob patterns and negation.\n\nExample: `branches: \"main release/*\"`",
        "concurrency" => "**concurrency** - Parallel execution limit\n\nLimits how many instances of this step can run simultaneously across all agents.\n\nExample: `concurrency: 1`",
        "concurrency_group" => "**concurrency_group** - Concurrency grouping\n\nGroups steps together for concurrency limiting. Steps in the same group share concurrency limits.\n\nExample: `concurrency_group: \"deploy\"`",

        // Special step types
        "wait" => "**wait** - Wait step\n\nPauses the pipeline until all previous steps have completed. Useful for creating pipeline phases.\n\nExample: `wait: ~` or `wait: \"Continue to deploy?\"`",
        "block" => "**block** - Manual approval step\n\nPauses the pipeline and waits for manual approval before continuing.\n\nExample: `block: \"Deploy to production?\"`",
        "input" => "**input** - Input step\n\nCollects input from users before continuing the pipeline.\n\nExample:\n```yaml\ninput: \"Release details\"\nfields:\n  - text: \"version\"\n    required: true\n```",
        "trigger" => "**trigger** - Trigger another pipeline\n\nTriggers another pipeline and optionally waits for it to complete.\n\nExample:\n```yaml\ntrigger: \"my-deployment-pipeline\"\nbuild:\n  message: \"Triggered from ${BUILDKITE_MESSAGE}\"\n```",

        // Plugin configuration (common options)
        "image" => "**image** - Docker image to use\n\nSpecifies the Docker image for the docker plugin.\n\nExample: `image: \"node:18\"`",
        "volumes" => "**volumes** - Docker volume mounts\n\nMounts host directories or volumes into the Docker container.\n\nExample:\n```yaml\nvolumes:\n  - \".:/app\"\n  - \"./cache:/cache\"\n```",
        "key" => "**key** - Cache key\n\nUnique identifier for the cache entry in the cache plugin.\n\nExample: `key: \"v1-{{ checksum 'package-lock.json' }}\"`",
        "paths" => "**paths** - Cache paths\n\nDirectories or files to cache.\n\nExample:\n```yaml\npaths:\n  - \"node_modules\"\n  - \".cache\"\n```",
        _ => return None,
    };

    Some(doc)
}

/// One parameter of a step-type signature.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub label: &'static str,
    pub doc: &'static str,
}

/// Signature template for a step type.
#[derive(Debug, Clone, Copy)]
pub struct SignatureSpec {
    pub label: &'static str,
    pub doc: &'static str,
    pub params: &'static [ParamSpec],
}

static COMMAND_SIGNATURE: SignatureSpec = SignatureSpec {
    label: "Command Step",
    doc: "A command step runs shell commands on an agent",
    params: &[
        ParamSpec {
            label: "command",
            doc: "Shell command(s) to execute",
        },
        ParamSpec {
            label: "label",
            doc: "Display name for the step",
        },
        ParamSpec {
            label: "agents",
            doc: "Agent targeting rules",
        },
        ParamSpec {
            label: "env",
            doc: "Environment variables",
        },
        ParamSpec {
            label: "plugins",
            doc: "Plugins to use",
        },
    ],
};

static WAIT_SIGNATURE: SignatureSpec = SignatureSpec {
    label: "Wait Step",
    doc: "A wait step waits for previous steps to complete",
    params: &[
        ParamSpec {
            label: "wait",
            doc: "Wait message or duration",
        },
        ParamSpec {
            label: "continue_on_failure",
            doc: "Continue if previous steps fail",
        },
        ParamSpec {
            label: "depends_on",
            doc: "Specific step dependencies",
        },
    ],
};

static BLOCK_SIGNATURE: SignatureSpec = SignatureSpec {
    label: "Block Step",
    doc: "A block step pauses the pipeline and waits for manual approval",
    params: &[
        ParamSpec {
            label: "block",
            doc: "Block message shown to users",
        },
        ParamSpec {
            label: "prompt",
            doc: "Additional prompt text",
        },
        ParamSpec {
            label: "fields",
            doc: "Input fields for user interaction",
        },
    ],
};

static INPUT_SIGNATURE: SignatureSpec = SignatureSpec {
    label: "Input Step",
    doc: "An input step collects information from users",
    params: &[
        ParamSpec {
            label: "input",
            doc: "Input prompt message",
        },
        ParamSpec {
            label: "fields",
            doc: "Input field definitions",
        },
    ],
};

static TRIGGER_SIGNATURE: SignatureSpec = SignatureSpec {
    label: "Trigger Step",
    doc: "A trigger step starts another pipeline",
    params: &[
        ParamSpec {
            label: "trigger",
            doc: "Pipeline slug to trigger",
        },
        ParamSpec {
            label: "build",
            doc: "Build configuration",
        },
        ParamSpec {
            label: "async",
            doc: "Don't wait for completion",
        },
    ],
};

/// Signature for a step type keyword; `group` steps have none.
pub fn step_signature(step_type: &str) -> Option<&'static SignatureSpec> {
    match step_type {
        "command" => Some(&COMMAND_SIGNATURE),
        "wait" => Some(&WAIT_SIGNATURE),
        "block" => Some(&BLOCK_SIGNATURE),
        "input" => Some(&INPUT_SIGNATURE),
        "trigger" => Some(&TRIGGER_SIGNATURE),
        _ => None,
    }
}
