//! # Remote Interface Contract
//!
//! A `ServiceContract` is the named set of method signatures a skeleton
//! exposes and a stub implements. It is validated before any network work:
//!
//! - it must be a pure interface (no method carries a body);
//! - every method must declare `REMOTE_FAILURE` in its failure set;
//! - no two methods may share a name and parameter descriptors.
//!
//! A `MethodTable` is the dispatch table built once per validated contract.

use std::collections::HashMap;
use std::collections::HashSet;

use rmipack::Decoder;
use rmipack::Encoder;
use rmiwire::MethodId;
use rmiwire::Value;
use rmiwire::ValueType;
use rmiwire::decode_type;
use rmiwire::encode_type;

use crate::error::ContractError;
use crate::fault::Fault;
use crate::fault::REMOTE_FAILURE;

/// One method of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    name: String,
    params: Vec<ValueType>,
    returns: ValueType,
    throws: Vec<String>,
    has_body: bool,
}

impl MethodSignature {
    /// A method with no parameters, returning unit, declaring no failures.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ValueType::Unit,
            throws: Vec::new(),
            has_body: false,
        }
    }

    pub fn param(mut self, ty: ValueType) -> Self {
        self.params.push(ty);
        self
    }

    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = ty;
        self
    }

    pub fn throws(mut self, identity: impl Into<String>) -> Self {
        self.throws.push(identity.into());
        self
    }

    /// Marks the method as carrying a concrete body. Contracts with such
    /// methods are not interfaces and are rejected.
    pub fn with_body(mut self) -> Self {
        self.has_body = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn return_type(&self) -> &ValueType {
        &self.returns
    }

    pub fn failures(&self) -> &[String] {
        &self.throws
    }

    pub fn declares(&self, identity: &str) -> bool {
        self.throws.iter().any(|t| t == identity)
    }

    /// Parameter descriptors as they travel in a call frame.
    pub fn param_descriptors(&self) -> Vec<String> {
        self.params.iter().map(ToString::to_string).collect()
    }

    /// Checks an argument list against the declared parameters.
    pub fn check_args(&self, args: &[Value]) -> Result<(), String> {
        if args.len() != self.params.len() {
            return Err(format!(
                "{} expects {} argument(s), got {}",
                self.name,
                self.params.len(),
                args.len()
            ));
        }
        for (i, (arg, ty)) in args.iter().zip(&self.params).enumerate() {
            if !arg.conforms_to(ty) {
                return Err(format!(
                    "{} argument {}: expected {}, got {}",
                    self.name,
                    i,
                    ty,
                    arg.kind()
                ));
            }
        }
        Ok(())
    }

    fn encode(&self, enc: &mut Encoder) -> rmiwire::Result<()> {
        enc.map_begin()?;

        enc.variant_begin("name")?;
        enc.str(&self.name)?;
        enc.variant_end()?;

        enc.variant_begin("params")?;
        enc.list_begin()?;
        for param in &self.params {
            encode_type(enc, param)?;
        }
        enc.list_end()?;
        enc.variant_end()?;

        enc.variant_begin("returns")?;
        encode_type(enc, &self.returns)?;
        enc.variant_end()?;

        enc.variant_begin("throws")?;
        enc.list_begin()?;
        for identity in &self.throws {
            enc.str(identity)?;
        }
        enc.list_end()?;
        enc.variant_end()?;

        enc.variant_begin("body")?;
        enc.bool(self.has_body)?;
        enc.variant_end()?;

        enc.map_end()?;
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> rmiwire::Result<Self> {
        let mut name = None;
        let mut params = Vec::new();
        let mut returns = None;
        let mut throws = Vec::new();
        let mut has_body = false;

        for entry in dec.map()? {
            let (key, mut val) = entry?;
            match key {
                "name" => name = Some(val.str()?.to_string()),
                "params" => {
                    for item in val.list()? {
                        params.push(decode_type(&mut item?)?);
                    }
                }
                "returns" => returns = Some(decode_type(&mut val)?),
                "throws" => {
                    for item in val.list()? {
                        throws.push(item?.str()?.to_string());
                    }
                }
                "body" => has_body = val.bool()?,
                _ => val.skip()?,
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| missing("method name"))?,
            params,
            returns: returns.ok_or_else(|| missing("return type"))?,
            throws,
            has_body,
        })
    }
}

/// A named set of method signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceContract {
    name: String,
    methods: Vec<MethodSignature>,
}

impl ServiceContract {
    /// Starts an interface with a fully qualified name, e.g. `"demo.Echo"`.
    pub fn interface(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: Vec::new() }
    }

    pub fn method(mut self, sig: MethodSignature) -> Self {
        self.methods.push(sig);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.name.is_empty() {
            return Err(ContractError::EmptyName);
        }

        let mut seen = HashSet::new();
        for sig in &self.methods {
            if sig.name.is_empty() {
                return Err(ContractError::EmptyName);
            }
            if sig.has_body {
                return Err(ContractError::NotAnInterface {
                    contract: self.name.clone(),
                    method: sig.name.clone(),
                });
            }
            if !sig.declares(REMOTE_FAILURE) {
                return Err(ContractError::MissingRemoteFailure {
                    contract: self.name.clone(),
                    method: sig.name.clone(),
                });
            }
            if !seen.insert((sig.name.as_str(), &sig.params)) {
                return Err(ContractError::DuplicateMethod {
                    contract: self.name.clone(),
                    method: sig.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The wire identifier of one of this contract's methods.
    pub fn method_id(&self, sig: &MethodSignature) -> MethodId {
        MethodId {
            interface: self.name.clone(),
            method: sig.name.clone(),
            params: sig.param_descriptors(),
        }
    }

    pub(crate) fn encode(&self, enc: &mut Encoder) -> rmiwire::Result<()> {
        enc.map_begin()?;

        enc.variant_begin("name")?;
        enc.str(&self.name)?;
        enc.variant_end()?;

        enc.variant_begin("methods")?;
        enc.list_begin()?;
        for sig in &self.methods {
            sig.encode(enc)?;
        }
        enc.list_end()?;
        enc.variant_end()?;

        enc.map_end()?;
        Ok(())
    }

    /// Decodes a contract. The result is not validated.
    pub(crate) fn decode(dec: &mut Decoder) -> rmiwire::Result<Self> {
        let mut name = None;
        let mut methods = Vec::new();

        for entry in dec.map()? {
            let (key, mut val) = entry?;
            match key {
                "name" => name = Some(val.str()?.to_string()),
                "methods" => {
                    for item in val.list()? {
                        methods.push(MethodSignature::decode(&mut item?)?);
                    }
                }
                _ => val.skip()?,
            }
        }

        Ok(Self {
            name: name.ok_or_else(|| missing("contract name"))?,
            methods,
        })
    }
}

fn missing(what: &str) -> rmiwire::Error {
    rmiwire::Error::MissingField(what.to_string())
}

/// Dispatch table for one validated contract.
#[derive(Debug)]
pub struct MethodTable {
    methods: Vec<MethodSignature>,
    by_id: HashMap<MethodId, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl MethodTable {
    pub fn new(contract: &ServiceContract) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for (index, sig) in contract.methods.iter().enumerate() {
            by_id.insert(contract.method_id(sig), index);
            by_name.entry(sig.name.clone()).or_default().push(index);
        }

        Self { methods: contract.methods.clone(), by_id, by_name }
    }

    /// Resolves a call frame's identifier: interface, name and parameter
    /// descriptors must all match.
    pub fn resolve(&self, id: &MethodId) -> Option<&MethodSignature> {
        self.by_id.get(id).map(|&index| &self.methods[index])
    }

    /// Picks the method a local call by name refers to. Overloads are told
    /// apart by which parameter list the arguments conform to.
    ///
    /// An unknown name is `MethodNotFound`. An overloaded name that no
    /// parameter list accepts is `BadArguments`.
    pub fn lookup(&self, name: &str, args: &[Value]) -> Result<&MethodSignature, Fault> {
        let candidates = self
            .by_name
            .get(name)
            .ok_or_else(|| Fault::no_such_method(format!("no such method: {}", name)))?;
        if let [only] = candidates.as_slice() {
            return Ok(&self.methods[*only]);
        }

        let mut rejected = Vec::with_capacity(candidates.len());
        for sig in candidates.iter().map(|&index| &self.methods[index]) {
            match sig.check_args(args) {
                Ok(()) => return Ok(sig),
                Err(reason) => rejected.push(reason),
            }
        }
        Err(Fault::bad_arguments(format!(
            "no overload of {} accepts the arguments: {}",
            name,
            rejected.join("; ")
        )))
    }
}
