//! Frame grabs of the game window through Windows Graphics Capture.

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use image::{Rgb, RgbaImage};
use tracing::debug;

use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ,
    D3D11_MAPPED_SUBRESOURCE, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::Graphics::Gdi::{GetDC, GetPixel, ReleaseDC};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::System::WinRT::RoGetActivationFactory;
use windows::core::{Interface, h};

use super::CaptureProvider;
use super::region::{FrameCrop, bgra_to_rgba, to_pixel};
use super::window::{ClientArea, client_area};
use crate::layout::RelativePoint;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture provider bound to the game window.
///
/// The D3D11 device is created once and reused for every grab; the scan
/// captures hundreds of frames.
pub struct WindowCapture {
    hwnd: HWND,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    winrt_device: IDirect3DDevice,
}

impl WindowCapture {
    pub fn new(hwnd: HWND) -> Result<Self> {
        let mut device = None;
        let mut context = None;
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
            )
            .context("D3D11CreateDevice failed")?;
        }
        let device: ID3D11Device = device.ok_or_else(|| anyhow!("No D3D11 device"))?;
        let context = context.ok_or_else(|| anyhow!("No D3D11 device context"))?;

        let dxgi: IDXGIDevice = device.cast()?;
        let winrt_device = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi)? }
            .cast()
            .context("Failed to wrap the D3D11 device for WinRT")?;

        Ok(Self {
            hwnd,
            device,
            context,
            winrt_device,
        })
    }

    fn capture_item(&self) -> Result<GraphicsCaptureItem> {
        let interop: IGraphicsCaptureItemInterop =
            unsafe { RoGetActivationFactory(h!("Windows.Graphics.Capture.GraphicsCaptureItem")) }
                .context("Graphics Capture is unavailable")?;
        unsafe { interop.CreateForWindow(self.hwnd) }.context("Failed to create a capture item for the game window")
    }

    /// Waits for one frame from a fresh free-threaded pool.
    fn next_frame(&self, pool: &Direct3D11CaptureFramePool, item: &GraphicsCaptureItem) -> Result<Direct3D11CaptureFrame> {
        let (tx, rx) = mpsc::sync_channel(1);
        pool.FrameArrived(&TypedEventHandler::new(move |_, _| {
            let _ = tx.try_send(());
            Ok(())
        }))?;

        let session = pool.CreateCaptureSession(item)?;
        session.StartCapture()?;
        let arrived = rx.recv_timeout(FRAME_TIMEOUT);
        let frame = arrived
            .map_err(|_| anyhow!("No capture frame within {:?}", FRAME_TIMEOUT))
            .and_then(|()| Ok(pool.TryGetNextFrame()?));
        session.Close()?;
        frame
    }

    /// Copies `texture` to a CPU-readable staging texture and crops the
    /// client area out of it.
    fn read_client_area(&self, texture: &ID3D11Texture2D, area: &ClientArea) -> Result<RgbaImage> {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let staging_desc = D3D11_TEXTURE2D_DESC {
            MipLevels: 1,
            ArraySize: 1,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
            ..desc
        };
        let mut staging: Option<ID3D11Texture2D> = None;
        unsafe { self.device.CreateTexture2D(&staging_desc, None, Some(&mut staging))? };
        let staging: ID3D11Resource = staging.ok_or_else(|| anyhow!("No staging texture"))?.cast()?;

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context.CopyResource(&staging, &texture.cast::<ID3D11Resource>()?);
            self.context.Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;
        }

        let pitch = mapped.RowPitch as usize;
        let data = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, pitch * desc.Height as usize) };
        let crop = FrameCrop {
            x: area.inset.x.max(0) as u32,
            y: area.inset.y.max(0) as u32,
            width: area.width,
            height: area.height,
        };
        let image = bgra_to_rgba(data, pitch, (desc.Width, desc.Height), crop);
        unsafe { self.context.Unmap(&staging, 0) };

        debug!(width = crop.width, height = crop.height, inset_x = crop.x, inset_y = crop.y, "Captured frame");
        Ok(image)
    }
}

impl CaptureProvider for WindowCapture {
    fn window_size(&self) -> Result<(u32, u32)> {
        let area = client_area(self.hwnd)?;
        Ok((area.width, area.height))
    }

    fn capture_window(&self) -> Result<RgbaImage> {
        let area = client_area(self.hwnd)?;
        let item = self.capture_item()?;
        let pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &self.winrt_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            item.Size()?,
        )?;

        let grabbed = self.next_frame(&pool, &item).and_then(|frame| {
            let access: IDirect3DDxgiInterfaceAccess = frame.Surface()?.cast()?;
            let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };
            self.read_client_area(&texture, &area)
        });
        pool.Close()?;
        grabbed
    }

    /// Reads one pixel from the screen DC instead of grabbing a frame.
    fn pixel(&self, point: RelativePoint) -> Result<Rgb<u8>> {
        let area = client_area(self.hwnd)?;
        let (x, y) = to_pixel(point, (area.width, area.height));

        let colour = unsafe {
            let hdc = GetDC(HWND::default());
            let colour = GetPixel(hdc, area.origin.x + x as i32, area.origin.y + y as i32);
            ReleaseDC(HWND::default(), hdc);
            colour
        };

        // COLORREF is 0x00BBGGRR
        let [r, g, b, _] = colour.0.to_le_bytes();
        Ok(Rgb([r, g, b]))
    }
}
