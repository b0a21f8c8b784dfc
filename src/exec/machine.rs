// ============================================================
// Exec — Machine placement
// ============================================================
// `env.machine` names where an exec runs ("cpu", "cuda:0",
// "gpu:1", "gpu"). HostBackend turns that name into a Burn
// device for one concrete autodiff backend:
//
//   CpuBackend  Autodiff<NdArray>   cpu only
//   GpuBackend  Autodiff<Wgpu>      cpu or a discrete gpu index
//                                   (needs the `wgpu` feature)

use std::{fmt, str::FromStr};

use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    tensor::backend::AutodiffBackend,
};

use crate::error::{ExecError, Result};

pub type CpuBackend = Autodiff<NdArray>;

#[cfg(feature = "wgpu")]
pub type GpuBackend = Autodiff<burn::backend::Wgpu>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Cpu,
    Gpu(usize),
}

impl Machine {
    pub fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu(_))
    }
}

impl FromStr for Machine {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.split_once(':') {
            None if s == "cpu" => Ok(Self::Cpu),
            None if s == "gpu" || s == "cuda" => Ok(Self::Gpu(0)),
            Some(("cuda" | "gpu", index)) => index
                .parse()
                .map(Self::Gpu)
                .map_err(|_| ExecError::invalid("env.machine", format!("bad device index in '{s}'"))),
            _ => Err(ExecError::invalid(
                "env.machine",
                format!("'{s}' is not one of cpu, gpu, gpu:N, cuda:N"),
            )),
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu(i) => write!(f, "cuda:{i}"),
        }
    }
}

/// An autodiff backend an exec can be placed on.
pub trait HostBackend: AutodiffBackend {
    const NAME: &'static str;

    fn device(machine: &Machine) -> Result<Self::Device>;
}

impl HostBackend for CpuBackend {
    const NAME: &'static str = "ndarray";

    fn device(machine: &Machine) -> Result<Self::Device> {
        match machine {
            Machine::Cpu => Ok(NdArrayDevice::Cpu),
            Machine::Gpu(_) => Err(ExecError::UnsupportedMachine {
                machine: machine.to_string(),
                backend: Self::NAME,
            }),
        }
    }
}

#[cfg(feature = "wgpu")]
impl HostBackend for GpuBackend {
    const NAME: &'static str = "wgpu";

    fn device(machine: &Machine) -> Result<Self::Device> {
        use burn::backend::wgpu::WgpuDevice;

        Ok(match machine {
            Machine::Cpu => WgpuDevice::Cpu,
            Machine::Gpu(i) => WgpuDevice::DiscreteGpu(*i),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("cpu".parse::<Machine>().unwrap(), Machine::Cpu);
        assert_eq!("CUDA:1".parse::<Machine>().unwrap(), Machine::Gpu(1));
        assert_eq!("gpu:2".parse::<Machine>().unwrap(), Machine::Gpu(2));
        assert_eq!("gpu".parse::<Machine>().unwrap(), Machine::Gpu(0));
        assert!("tpu".parse::<Machine>().is_err());
        assert!("cuda:x".parse::<Machine>().is_err());
        assert_eq!(Machine::Gpu(3).to_string(), "cuda:3");
    }

    #[test]
    fn test_cpu_backend_rejects_gpu() {
        assert_eq!(CpuBackend::device(&Machine::Cpu).unwrap(), NdArrayDevice::Cpu);
        assert!(matches!(
            CpuBackend::device(&Machine::Gpu(0)),
            Err(ExecError::UnsupportedMachine { backend: "ndarray", .. })
        ));
    }
}
