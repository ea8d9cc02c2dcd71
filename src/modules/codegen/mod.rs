//! Code generator: renders the reconstructed call model as a Foundry test
//!
//! Output layout is fixed so that identical input yields byte-identical
//! source: file-level structs, interfaces, then one `ReplayTest` contract
//! holding address constants, `setUp`, `testReplay`, callback handlers and
//! `receive`.

mod format;
mod handlers;
mod structs;

use std::collections::{BTreeSet, HashMap, HashSet};

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::domain::abi::{parse_signature, DecodeTier, DecodedCall};
use crate::domain::model::CallbackRegion;
use crate::modules::naming::NamingResult;
use crate::modules::toolkit::{checksum, sanitize_identifier};
use crate::modules::walker::{ReplayStep, WalkResult};

pub use format::{hex_literal, param_decl, string_literal, ValueFormatter};
pub use handlers::{handler_for, HandlerReturn, HandlerSpec, ACCOUNT_INFO_SHAPE};
pub use structs::{has_empty_tuple, StructDef, StructRegistry};

pub const CONTRACT_NAME: &str = "ReplayTest";
pub const MAIN_ACTOR_CONST: &str = "mainActor";
const SOLIDITY_PRAGMA: &str = "^0.8.20";
const INDENT: &str = "    ";

/// Everything the renderer reads; frozen before rendering starts
pub struct RenderContext<'a> {
    pub walk: &'a WalkResult,
    pub naming: &'a NamingResult,
    pub main: Address,
    pub tx_origin: Option<Address>,
    /// Environment variable holding the fork RPC URL
    pub rpc_env_var: &'a str,
    pub fork_block: Option<u64>,
    /// Comment lines emitted under the imports
    pub header: Vec<String>,
}

struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Open a brace block; empty text opens a bare scope
    fn open(&mut self, text: impl AsRef<str>) {
        match text.as_ref() {
            "" => self.line("{"),
            head => self.line(format!("{head} {{")),
        }
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    fn finish(self) -> String {
        self.out
    }
}

struct InterfaceFn {
    name: String,
    /// Solidity parameter declarations
    params: Vec<String>,
}

struct InterfaceBlock {
    name: String,
    functions: Vec<InterfaceFn>,
}

/// Handler declaration plus the regions replayed through it
struct HandlerGroup<'a> {
    spec: HandlerSpec,
    regions: Vec<&'a CallbackRegion>,
    /// Storage counter dispatching between regions; set when there are several
    counter: Option<String>,
}

/// Name and kind of the handler a region replays from
fn handler_label(spec: &HandlerSpec) -> String {
    match spec {
        HandlerSpec::Function { name, .. } => name.clone(),
        HandlerSpec::Fallback => "fallback".to_string(),
    }
}

/// Render the replay test source
pub fn render(ctx: &RenderContext<'_>) -> String {
    Renderer::new(ctx).render()
}

struct Renderer<'a> {
    ctx: &'a RenderContext<'a>,
    structs: StructRegistry,
    interfaces: Vec<InterfaceBlock>,
    /// Signatures declarable in Solidity and therefore callable typed
    typeable: HashSet<String>,
    /// `(interface, function name)` pairs declared more than once
    overloaded: HashSet<(String, String)>,
    handlers: Vec<HandlerGroup<'a>>,
    /// Address constant names after collision fixups
    names: HashMap<Address, String>,
}

impl<'a> Renderer<'a> {
    fn new(ctx: &'a RenderContext<'a>) -> Self {
        let mut structs = StructRegistry::new();

        let mut handlers: Vec<HandlerGroup<'a>> = Vec::new();
        for region in &ctx.walk.regions {
            let spec = handler_for(region);
            match handlers.iter_mut().find(|g| g.spec == spec) {
                Some(group) => group.regions.push(region),
                None => handlers.push(HandlerGroup {
                    spec,
                    regions: vec![region],
                    counter: None,
                }),
            }
        }
        if handlers.iter().any(|g| g.spec.uses_account_info()) {
            structs.declare(ACCOUNT_INFO_SHAPE, "AccountInfo", &["address", "uint256"]);
        }

        let mut interfaces = Vec::new();
        let mut typeable = HashSet::new();
        let mut overloaded = HashSet::new();
        for decl in &ctx.naming.interfaces {
            let mut functions = Vec::new();
            let mut seen_names: HashSet<String> = HashSet::new();
            for signature in &decl.signatures {
                let Some(params) = declare_function(&mut structs, signature) else {
                    debug!(%signature, interface = %decl.name, "signature not declarable, replaying raw");
                    continue;
                };
                let Some((name, _)) = parse_signature(signature) else {
                    continue;
                };
                if !seen_names.insert(name.clone()) {
                    overloaded.insert((decl.name.clone(), name.clone()));
                }
                typeable.insert(signature.clone());
                functions.push(InterfaceFn { name, params });
            }
            interfaces.push(InterfaceBlock {
                name: decl.name.clone(),
                functions,
            });
        }

        for group in &handlers {
            if let HandlerSpec::Function { name, params, .. } = &group.spec {
                for (idx, param) in params.iter().enumerate() {
                    if let Ok(ty) = DynSolType::parse(param) {
                        structs.register(&ty, &format!("{name}Param{idx}"));
                    }
                }
            }
        }

        let mut taken: BTreeSet<String> = [CONTRACT_NAME, MAIN_ACTOR_CONST, "FORK_BLOCK", "setUp", "testReplay"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        taken.extend(interfaces.iter().map(|i| i.name.clone()));
        taken.extend(structs.defs().iter().map(|d| d.name.clone()));
        taken.extend(handlers.iter().map(|g| handler_label(&g.spec)));

        // each dispatching handler counts its own entries
        for group in handlers.iter_mut().filter(|g| g.regions.len() > 1) {
            let mut counter = format!("{}Step", handler_label(&group.spec));
            while taken.contains(&counter) {
                counter.push('_');
            }
            taken.insert(counter.clone());
            group.counter = Some(counter);
        }

        let mut names = HashMap::new();
        for decl in &ctx.naming.addresses {
            if decl.address == ctx.main {
                continue;
            }
            let mut name = decl.name.clone();
            while taken.contains(&name) {
                name.push('_');
            }
            taken.insert(name.clone());
            names.insert(decl.address, name);
        }

        Self {
            ctx,
            structs,
            interfaces,
            typeable,
            overloaded,
            handlers,
            names,
        }
    }

    fn render(&self) -> String {
        let mut w = SourceWriter::new();
        w.line("// SPDX-License-Identifier: UNLICENSED");
        w.line(format!("pragma solidity {SOLIDITY_PRAGMA};"));
        w.blank();
        w.line("import \"forge-std/Test.sol\";");
        w.blank();
        if !self.ctx.header.is_empty() {
            for line in &self.ctx.header {
                w.line(format!("// {line}"));
            }
            w.blank();
        }

        for def in self.structs.defs() {
            w.open(format!("struct {}", def.name));
            for (idx, field) in def.fields.iter().enumerate() {
                w.line(format!("{field} field{idx};"));
            }
            w.close();
            w.blank();
        }

        for block in &self.interfaces {
            w.open(format!("interface {}", block.name));
            for function in &block.functions {
                w.line(format!("function {}({}) external;", function.name, function.params.join(", ")));
            }
            w.close();
            w.blank();
        }

        w.open(format!("contract {CONTRACT_NAME} is Test"));
        self.render_constants(&mut w);
        w.blank();
        self.render_setup(&mut w);
        w.blank();
        self.render_replay(&mut w);
        for group in &self.handlers {
            w.blank();
            self.render_handler(&mut w, group);
        }
        w.blank();
        w.line("receive() external payable {}");
        w.close();

        w.finish()
    }

    fn render_constants(&self, w: &mut SourceWriter) {
        w.line(format!("address constant {MAIN_ACTOR_CONST} = {};", checksum(&self.ctx.main)));

        let mut known: Vec<(&String, &Address)> = Vec::new();
        let mut derived: Vec<(&String, &Address)> = Vec::new();
        for decl in &self.ctx.naming.addresses {
            let Some(name) = self.names.get(&decl.address) else {
                continue;
            };
            if decl.origin.is_known() {
                known.push((name, &decl.address));
            } else {
                derived.push((name, &decl.address));
            }
        }
        known.sort();
        derived.sort();
        for (name, address) in known.into_iter().chain(derived) {
            w.line(format!("address constant {name} = {};", checksum(address)));
        }

        if let Some(block) = self.ctx.fork_block {
            w.blank();
            w.line(format!("uint256 constant FORK_BLOCK = {block};"));
        }
        let counters: Vec<&String> = self.handlers.iter().filter_map(|g| g.counter.as_ref()).collect();
        if !counters.is_empty() {
            w.blank();
            for counter in counters {
                w.line(format!("uint256 private {counter};"));
            }
        }
    }

    fn render_setup(&self, w: &mut SourceWriter) {
        w.open("function setUp() public");
        let rpc = format!("vm.envString({})", string_literal(self.ctx.rpc_env_var));
        match self.ctx.fork_block {
            Some(_) => w.line(format!("vm.createSelectFork({rpc}, FORK_BLOCK);")),
            None => w.line(format!("vm.createSelectFork({rpc});")),
        }
        w.line(format!("vm.label(address(this), {});", string_literal(MAIN_ACTOR_CONST)));

        let mut labelled: Vec<&String> = self.names.values().collect();
        labelled.sort();
        for name in labelled {
            w.line(format!("vm.label({name}, {});", string_literal(name)));
        }

        let total = self
            .ctx
            .walk
            .all_calls()
            .fold(U256::ZERO, |acc, call| acc.saturating_add(call.value));
        if !total.is_zero() {
            w.line(format!("vm.deal(address(this), {total});"));
        }
        w.close();
    }

    fn render_replay(&self, w: &mut SourceWriter) {
        let mut fmt = ValueFormatter::new(self.ctx.main, &self.names, &self.structs);
        w.open("function testReplay() public");
        let origin = self.ctx.tx_origin.map(|origin| fmt.address(&origin));
        if let Some(origin) = &origin {
            w.line(format!("vm.startPrank(address(this), {origin});"));
        }

        let steps = self.ctx.walk.steps();
        if steps.is_empty() {
            w.line("// no calls from the main actor in this trace");
        }
        for step in steps {
            match step {
                ReplayStep::Call(call) => self.render_call(w, &mut fmt, call),
                ReplayStep::Trigger(region) => {
                    let handler = self
                        .handlers
                        .iter()
                        .find(|g| g.regions.iter().any(|r| std::ptr::eq(*r, region)))
                        .map(|g| handler_label(&g.spec))
                        .unwrap_or_else(|| "fallback".to_string());
                    w.line(format!(
                        "// opens {} region #{}..#{}, replayed in {handler}",
                        region.kind, region.start, region.end
                    ));
                    self.render_call(w, &mut fmt, &region.trigger);
                }
            }
        }

        if origin.is_some() {
            w.line("vm.stopPrank();");
        }
        w.close();
    }

    fn render_handler(&self, w: &mut SourceWriter, group: &HandlerGroup<'_>) {
        let mut fmt = ValueFormatter::new(self.ctx.main, &self.names, &self.structs);
        let returns = match &group.spec {
            HandlerSpec::Function { name, params, returns } => {
                let decls: Vec<String> = params
                    .iter()
                    .map(|p| match DynSolType::parse(p) {
                        Ok(ty) => param_decl(&self.structs.type_name(&ty), &ty, "calldata"),
                        Err(_) => p.clone(),
                    })
                    .collect();
                let suffix = match returns {
                    HandlerReturn::Nothing => String::new(),
                    HandlerReturn::True => " returns (bool)".to_string(),
                    HandlerReturn::Erc3156Magic => " returns (bytes32)".to_string(),
                };
                w.open(format!("function {name}({}) external{suffix}", decls.join(", ")));
                *returns
            }
            HandlerSpec::Fallback => {
                w.open("fallback() external payable");
                HandlerReturn::Nothing
            }
        };

        match &group.counter {
            Some(counter) => self.render_dispatch(w, &mut fmt, &group.regions, counter),
            None => {
                for region in &group.regions {
                    self.render_region(w, &mut fmt, region);
                }
            }
        }

        match returns {
            HandlerReturn::Nothing => {}
            HandlerReturn::True => w.line("return true;"),
            HandlerReturn::Erc3156Magic => w.line("return keccak256(\"ERC3156FlashBorrower.onFlashLoan\");"),
        }
        w.close();
    }

    /// Branch on the handler's own counter so each entry replays the next region
    fn render_dispatch(
        &self,
        w: &mut SourceWriter,
        fmt: &mut ValueFormatter<'_>,
        regions: &[&CallbackRegion],
        counter: &str,
    ) {
        w.line(format!("uint256 step = {counter}++;"));
        for (idx, region) in regions.iter().enumerate() {
            let head = if idx == 0 { "if" } else { "} else if" };
            w.depth = w.depth.saturating_sub(usize::from(idx > 0));
            w.open(format!("{head} (step == {idx})"));
            self.render_region(w, fmt, region);
        }
        w.close();
    }

    fn render_region(&self, w: &mut SourceWriter, fmt: &mut ValueFormatter<'_>, region: &CallbackRegion) {
        w.line(format!(
            "// {} region #{}..#{} opened by #{} {}",
            region.kind, region.start, region.end, region.trigger_key, region.trigger.signature
        ));
        if region.suspect_truncation {
            w.line("// main-actor call resumes right at the window end; region may be truncated");
        }
        for call in &region.calls {
            self.render_call(w, fmt, call);
        }
    }

    /// Interface and parsed parameter types when the call can be replayed typed
    fn typed_target(&self, call: &DecodedCall) -> Option<(&str, Vec<DynSolType>)> {
        if !call.tier.is_typed() || !self.typeable.contains(&call.signature) {
            return None;
        }
        let iface = self.ctx.naming.interface_of(&call.target)?;
        let types = call
            .params
            .iter()
            .map(|p| DynSolType::parse(&p.kind).ok())
            .collect::<Option<Vec<_>>>()?;
        Some((iface, types))
    }

    fn render_call(&self, w: &mut SourceWriter, fmt: &mut ValueFormatter<'_>, call: &DecodedCall) {
        let target = fmt.address(&call.target);
        let value = (!call.value.is_zero()).then(|| format!("{{value: {}}}", call.value));
        let value_opt = value.as_deref().unwrap_or("");
        let failed = string_literal(&format!("#{} {} failed", call.key, call.name));

        if call.is_native_transfer() {
            w.line(format!("// #{} native transfer", call.key));
            w.open("");
            w.line(format!("(bool ok, ) = {target}.call{value_opt}({});", hex_literal(&call.calldata)));
            w.line(format!("require(ok, {failed});"));
            w.close();
            return;
        }

        w.line(format!("// #{} {}", call.key, call.signature));
        if let Some((iface, types)) = self.typed_target(call) {
            let name = parse_signature(&call.signature)
                .map(|(name, _)| name)
                .unwrap_or_else(|| call.name.clone());
            let overloaded = self.overloaded.contains(&(iface.to_string(), name.clone()));
            let cast = overloaded || value.is_some();
            let mut prelude = Vec::new();
            let args: Vec<String> = call
                .params
                .iter()
                .zip(&types)
                .map(|(param, ty)| fmt.value(&param.value, ty, cast, &mut prelude))
                .collect();

            if value.is_some() {
                w.open("");
                for line in prelude {
                    w.line(line);
                }
                let mut encoded = vec![string_literal(&call.signature)];
                encoded.extend(args);
                w.line(format!(
                    "(bool ok, ) = {target}.call{value_opt}(abi.encodeWithSignature({}));",
                    encoded.join(", ")
                ));
                w.line(format!("require(ok, {failed});"));
                w.close();
            } else if prelude.is_empty() {
                w.line(format!("{iface}({target}).{name}({});", args.join(", ")));
            } else {
                // temporaries are block-scoped
                w.open("");
                for line in prelude {
                    w.line(line);
                }
                w.line(format!("{iface}({target}).{name}({});", args.join(", ")));
                w.close();
            }
            return;
        }

        match call.tier {
            DecodeTier::Opaque => w.line(format!(
                "// selector {} could not be resolved; replaying raw payload",
                call.selector_hex()
            )),
            DecodeTier::ResolverRaw => w.line("// parameters did not decode against this signature; replaying raw payload"),
            _ => w.line("// signature cannot be declared in Solidity; replaying raw payload"),
        }
        w.open("");
        w.line(format!("(bool ok, ) = {target}.call{value_opt}({});", hex_literal(&call.calldata)));
        w.line(format!("require(ok, {failed});"));
        w.close();
    }
}

/// Parameter declarations for an interface function, registering structs
///
/// `None` when the signature cannot be written as a Solidity declaration.
fn declare_function(structs: &mut StructRegistry, signature: &str) -> Option<Vec<String>> {
    let (name, params) = parse_signature(signature)?;
    if sanitize_identifier(&name) != name {
        return None;
    }
    let types = params
        .iter()
        .map(|p| DynSolType::parse(p).ok())
        .collect::<Option<Vec<_>>>()?;
    if types.iter().any(has_empty_tuple) {
        return None;
    }
    Some(
        types
            .iter()
            .enumerate()
            .map(|(idx, ty)| {
                let spelled = structs.register(ty, &format!("{name}Param{idx}"));
                param_decl(&spelled, ty, "calldata")
            })
            .collect(),
    )
}
