use crate::align::AlignOptions;
use crate::assemble::AssembleOptions;
use crate::cli::CommandLineArgs;
use crate::pipeline::PipelineOptions;
use crate::resource_manager::ResourceManager;
use crate::response_cache::ResponseCache;
use crate::sources::SourceLocation;

use std::sync::Arc;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Resource manager.
    pub resource_manager: ResourceManager,

    /// Extraction options derived from the arguments, with a resample width of one hour.
    pub pipeline: PipelineOptions,

    /// Where the combined endpoint finds its input files.
    pub sources: SourceLocation,

    /// Response cache, when enabled.
    pub cache: Option<ResponseCache>,
}

impl AppState {
    /// Create and return an [AppState].
    pub fn new(args: &CommandLineArgs) -> Self {
        let task_limit = args
            .thread_limit
            .or_else(|| Some(num_cpus::get().saturating_sub(1).max(1)));
        let resource_manager = ResourceManager::new(args.memory_limit, task_limit);
        let pipeline = PipelineOptions {
            layer: args.layer.clone(),
            id_column: args.id_column.clone(),
            align: AlignOptions {
                bucket_hours: 1,
                origin: args.resample_origin,
                reach_dimension: args.reach_dimension.clone(),
                time_dimension: args.time_dimension.clone(),
            },
            assemble: AssembleOptions {
                strict_ids: args.strict_ids,
            },
        };
        let sources = match &args.run_dir {
            Some(run_dir) => SourceLocation::Run(run_dir.clone()),
            None => SourceLocation::Staged(args.data_dir.clone()),
        };
        let cache = args.use_cache.then(|| ResponseCache::new(args.cache_size));

        Self {
            args: args.clone(),
            resource_manager,
            pipeline,
            sources,
            cache,
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
