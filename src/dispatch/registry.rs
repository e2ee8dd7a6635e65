//! Instruction registry.
//!
//! Maps APDU instructions to the handlers that implement them. The registry
//! is built once and read-only afterwards; it is the seam where credential
//! logic (registration, authentication) attaches.

use std::collections::HashMap;
use std::fmt;

use crate::apdu::{ApduRequest, Instruction, StatusWord};
use crate::core::{ErrorCode, U2F_VERSION};

/// Outcome of an instruction handler.
pub type HandlerResult = Result<Vec<u8>, ErrorCode>;

/// Handler for one APDU instruction.
///
/// `Ok` bytes are sent back as the `Message` response (including the status
/// word trailer); `Err` becomes an `Error` response.
///
/// # Example
///
/// ```
/// use u2f_ble_protocol::apdu::{ApduRequest, Instruction, StatusWord};
/// use u2f_ble_protocol::dispatch::{HandlerResult, InstructionRegistry};
///
/// let registry = InstructionRegistry::builder()
///     .register(Instruction::Vendor(0x40), |req: &ApduRequest| -> HandlerResult {
///         Ok(StatusWord::NoError.append_to(req.data.clone()))
///     })
///     .build();
/// assert!(registry.contains(Instruction::Vendor(0x40)));
/// ```
pub trait InstructionHandler: Send + Sync {
    /// Handle a decoded request.
    fn handle(&self, request: &ApduRequest) -> HandlerResult;
}

impl<F> InstructionHandler for F
where
    F: Fn(&ApduRequest) -> HandlerResult + Send + Sync,
{
    fn handle(&self, request: &ApduRequest) -> HandlerResult {
        self(request)
    }
}

/// Answers U2F_VERSION with the protocol version string.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionHandler;

impl InstructionHandler for VersionHandler {
    fn handle(&self, request: &ApduRequest) -> HandlerResult {
        if !request.data.is_empty() {
            return Ok(StatusWord::WrongLength.to_bytes().to_vec());
        }
        Ok(StatusWord::NoError.append_to(U2F_VERSION.to_vec()))
    }
}

/// Immutable instruction-to-handler table.
pub struct InstructionRegistry {
    handlers: HashMap<Instruction, Box<dyn InstructionHandler>>,
}

impl InstructionRegistry {
    /// Start building a registry.
    pub fn builder() -> InstructionRegistryBuilder {
        InstructionRegistryBuilder::new()
    }

    /// Look up the handler for an instruction.
    pub fn get(&self, instruction: Instruction) -> Option<&dyn InstructionHandler> {
        self.handlers.get(&instruction).map(|h| h.as_ref())
    }

    /// Whether an instruction has a handler.
    pub fn contains(&self, instruction: Instruction) -> bool {
        self.handlers.contains_key(&instruction)
    }

    /// Number of registered instructions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no instruction is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered instructions, in no particular order.
    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.handlers.keys().copied()
    }
}

impl fmt::Debug for InstructionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionRegistry")
            .field("instructions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`InstructionRegistry`].
#[derive(Default)]
pub struct InstructionRegistryBuilder {
    handlers: HashMap<Instruction, Box<dyn InstructionHandler>>,
}

impl InstructionRegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any earlier one for the instruction.
    pub fn register<H>(mut self, instruction: Instruction, handler: H) -> Self
    where
        H: InstructionHandler + 'static,
    {
        if self
            .handlers
            .insert(instruction, Box::new(handler))
            .is_some()
        {
            tracing::warn!(ins = instruction.as_byte(), "replacing instruction handler");
        }
        self
    }

    /// Register [`VersionHandler`] for U2F_VERSION.
    pub fn with_version(self) -> Self {
        self.register(Instruction::Version, VersionHandler)
    }

    /// Freeze the registry.
    pub fn build(self) -> InstructionRegistry {
        InstructionRegistry {
            handlers: self.handlers,
        }
    }
}

impl fmt::Debug for InstructionRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionRegistryBuilder")
            .field("instructions", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
