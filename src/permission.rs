use tracing::{debug, warn};

use crate::error::PlatformError;
use crate::platform::{PermissionRequirement, PermissionState, PlatformCapabilities, SensorPlatform};

/// Pide acceso a orientación y movimiento por separado y devuelve si se
/// concedió alguno. Una denegación o un fallo de la plataforma es `false`,
/// nunca un error.
pub fn negotiate<P>(platform: &P, capabilities: &PlatformCapabilities) -> bool
where
    P: SensorPlatform + ?Sized,
{
    let orientation = capabilities.has_orientation
        && resolve(
            "orientation",
            capabilities.orientation_permission,
            || platform.request_orientation_permission(),
        );
    let motion = capabilities.has_motion
        && resolve(
            "motion",
            capabilities.motion_permission,
            || platform.request_motion_permission(),
        );

    debug!(orientation, motion, "permisos de sensores resueltos");
    orientation || motion
}

fn resolve<F>(stream: &'static str, requirement: PermissionRequirement, request: F) -> bool
where
    F: FnOnce() -> Result<PermissionState, PlatformError>,
{
    if requirement == PermissionRequirement::NotRequired {
        return true;
    }
    match request() {
        Ok(PermissionState::Granted) => true,
        Ok(PermissionState::Denied) => {
            debug!(stream, "permiso denegado");
            false
        }
        Err(e) => {
            warn!(stream, error = %e, "fallo al pedir permiso");
            false
        }
    }
}
