//! Built-in backend adapters and their registry.

pub mod concrete;
pub mod fhe_bfv;
pub mod fhe_math;
pub mod native;
pub mod native_bgv;

use serde::{Deserialize, Serialize};

use crate::runner::{PolyBench, SchemeBench};

pub use concrete::ConcreteBackend;
pub use fhe_bfv::FheBfvBackend;
pub use fhe_math::FheMathBackend;
pub use native::NativeBackend;
pub use native_bgv::NativeBgvBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolyBackendKind {
    Native,
    FheMath,
    ConcreteNtt,
}

impl PolyBackendKind {
    pub const ALL: [PolyBackendKind; 3] = [Self::Native, Self::FheMath, Self::ConcreteNtt];

    pub fn id(self) -> &'static str {
        match self {
            Self::Native => native::ID,
            Self::FheMath => fhe_math::ID,
            Self::ConcreteNtt => concrete::ID,
        }
    }

    pub fn instantiate(self) -> Box<dyn PolyBench> {
        match self {
            Self::Native => Box::new(NativeBackend),
            Self::FheMath => Box::new(FheMathBackend),
            Self::ConcreteNtt => Box::new(ConcreteBackend),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeBackendKind {
    FheBfv,
    NativeBgv,
}

impl SchemeBackendKind {
    pub const ALL: [SchemeBackendKind; 2] = [Self::FheBfv, Self::NativeBgv];

    pub fn id(self) -> &'static str {
        match self {
            Self::FheBfv => fhe_bfv::ID,
            Self::NativeBgv => native_bgv::ID,
        }
    }

    pub fn instantiate(self) -> Box<dyn SchemeBench> {
        match self {
            Self::FheBfv => Box::new(FheBfvBackend),
            Self::NativeBgv => Box::new(NativeBgvBackend),
        }
    }
}
