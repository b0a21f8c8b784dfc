// ============================================================
// Infrastructure Layer
// ============================================================
// Everything that touches the file system on behalf of an exec:
//
//   root.rs        — ExecRoot: data/ logs/ models/ nodes/ layout
//
//   writer.rs      — ExecWriter / EpochWriter
//                    args.json and per-epoch metric rows under
//                    logs/, plus the ExecHandle the host uses to
//                    stop a run and watch its progress.
//
//   checkpoint.rs  — Saving and loading model weights
//                    Uses Burn's CompactRecorder to serialise
//                    model parameters to disk.
//
//   onnx.rs        — Hand-written protobuf encoder for the ONNX
//                    file `publish` produces.

/// Exec root directory layout
pub mod root;

/// Configuration and metrics writer
pub mod writer;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// ONNX model export
pub mod onnx;
