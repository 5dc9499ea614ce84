//! Frame capture using the Windows Graphics Capture API.
//!
//! A [`WindowCapture`] keeps one capture session open per window. WGC only
//! delivers a frame when the window content changes, so the last converted
//! frame is cached and returned while nothing new has arrived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};

use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
    GraphicsCaptureSession,
};
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use super::window::client_area_info;

/// How long the first grab waits for WGC to deliver a frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// An open capture session on one window.
pub struct WindowCapture {
    hwnd: HWND,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    frame_arrived: Arc<AtomicBool>,
    last: Option<RgbImage>,
}

// SAFETY: the frame pool is free-threaded, the D3D11 device is thread-safe,
// and the immediate context is only touched through `&mut self`.
unsafe impl Send for WindowCapture {}

impl WindowCapture {
    /// Opens a capture session on `hwnd`.
    pub fn open(hwnd: HWND) -> Result<Self> {
        let (device, context) = create_d3d11_device()?;
        let item = create_capture_item(hwnd)?;
        let size = item.Size()?;
        log::debug!("Capture size for {:?}: {}x{}", hwnd, size.Width, size.Height);

        let d3d_device = create_direct3d_device(&device)?;
        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &d3d_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            2,
            size,
        )?;
        let session = frame_pool.CreateCaptureSession(&item)?;

        let frame_arrived = Arc::new(AtomicBool::new(false));
        let flag = frame_arrived.clone();
        frame_pool.FrameArrived(&TypedEventHandler::new(
            move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))?;

        // The yellow capture border is optional and not present on older builds.
        let _ = session.SetIsBorderRequired(false);
        session.StartCapture()?;

        Ok(Self {
            hwnd,
            device,
            context,
            frame_pool,
            session,
            frame_arrived,
            last: None,
        })
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    /// Returns the newest frame, cropped to the client area.
    pub fn grab(&mut self) -> Result<RgbImage> {
        if self.last.is_none() {
            let start = Instant::now();
            while !self.frame_arrived.load(Ordering::SeqCst) {
                if start.elapsed() > FIRST_FRAME_TIMEOUT {
                    return Err(anyhow!("Timeout waiting for the first frame"));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        // Drain the pool and keep only the newest frame.
        let mut newest: Option<Direct3D11CaptureFrame> = None;
        while let Ok(frame) = self.frame_pool.TryGetNextFrame() {
            if let Some(old) = newest.replace(frame) {
                let _ = old.Close();
            }
        }
        self.frame_arrived.store(false, Ordering::SeqCst);

        if let Some(frame) = newest {
            let image = self.convert(&frame);
            let _ = frame.Close();
            self.last = Some(image?);
        }

        self.last
            .clone()
            .ok_or_else(|| anyhow!("No frame delivered for window {:?}", self.hwnd))
    }

    fn convert(&self, frame: &Direct3D11CaptureFrame) -> Result<RgbImage> {
        let surface = frame.Surface()?;
        let access: IDirect3DDxgiInterfaceAccess = surface.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: desc.SampleDesc,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };

        let staging_texture = unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
            staging.ok_or_else(|| anyhow!("Failed to create staging texture"))?
        };
        let staging: ID3D11Resource = staging_texture.cast()?;

        unsafe {
            self.context.CopyResource(&staging, &texture.cast::<ID3D11Resource>()?);
        }

        let mapped = unsafe {
            let mut mapped = Default::default();
            self.context
                .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;
            mapped
        };

        let (client_rect, offset) = client_area_info(self.hwnd)?;
        let crop_x = offset.x.max(0) as u32;
        let crop_y = offset.y.max(0) as u32;
        let crop_width = (client_rect.right - client_rect.left).max(0) as u32;
        let crop_height = (client_rect.bottom - client_rect.top).max(0) as u32;
        let crop_width = crop_width.min(desc.Width.saturating_sub(crop_x));
        let crop_height = crop_height.min(desc.Height.saturating_sub(crop_y));

        let src = unsafe {
            std::slice::from_raw_parts(
                mapped.pData as *const u8,
                (mapped.RowPitch * desc.Height) as usize,
            )
        };
        let row_pitch = mapped.RowPitch as usize;

        let mut img = RgbImage::new(crop_width, crop_height);
        for y in 0..crop_height {
            let row = (crop_y + y) as usize * row_pitch;
            for x in 0..crop_width {
                let offset = row + (crop_x + x) as usize * 4;
                // BGRA -> RGB
                img.put_pixel(x, y, Rgb([src[offset + 2], src[offset + 1], src[offset]]));
            }
        }

        unsafe { self.context.Unmap(&staging, 0) };

        Ok(img)
    }
}

impl Drop for WindowCapture {
    fn drop(&mut self) {
        let _ = self.session.Close();
        let _ = self.frame_pool.Close();
    }
}

fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }

    Ok((
        device.ok_or_else(|| anyhow!("Failed to create D3D11 device"))?,
        context.ok_or_else(|| anyhow!("Failed to create D3D11 context"))?,
    ))
}

/// Wraps a D3D11 device in the WinRT device type the capture API expects.
fn create_direct3d_device(
    device: &ID3D11Device,
) -> Result<windows::Graphics::DirectX::Direct3D11::IDirect3DDevice> {
    let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
    inspectable
        .cast()
        .context("Failed to cast to IDirect3DDevice")
}

fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop = unsafe {
        windows::Win32::System::WinRT::RoGetActivationFactory(class_name)
            .context("Failed to get IGraphicsCaptureItemInterop")?
    };
    unsafe {
        interop
            .CreateForWindow(hwnd)
            .context("Failed to create capture item for window")
    }
}
