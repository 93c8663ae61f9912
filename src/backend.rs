//! Backend abstraction
//!
//! Selects the compute backend at compile time. The ndarray CPU backend is
//! always compiled in; the wgpu or cuda features promote the default to a GPU
//! backend. Device selection against the run configuration happens once at
//! startup in [`crate::config::RunConfig::resolve_device`].

use burn::backend::Autodiff;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn::backend::Cuda;

#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(not(any(feature = "wgpu", feature = "cuda")))]
pub type DefaultBackend = burn::backend::NdArray;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the compiled backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}

/// Whether a GPU backend was compiled in
pub fn gpu_available() -> bool {
    cfg!(any(feature = "wgpu", feature = "cuda"))
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(all(feature = "wgpu", not(feature = "cuda")))]
    {
        "wgpu (GPU)"
    }
    #[cfg(not(any(feature = "wgpu", feature = "cuda")))]
    {
        "ndarray (CPU)"
    }
}
